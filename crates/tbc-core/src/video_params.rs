// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! System/geometry/IRE-level descriptor shared by every field in a source.

use serde::{Deserialize, Serialize};

/// Analogue video system a capture was decoded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoSystem {
    Pal,
    PalM,
    Ntsc,
    Unknown,
}

/// Geometry and IRE-level parameters common to every field produced by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VideoParameters {
    pub system: VideoSystem,
    pub field_width: u32,
    pub field_height: u32,
    pub active_video_start: u32,
    pub active_video_end: u32,
    pub first_active_field_line: u32,
    pub last_active_field_line: u32,
    pub colour_burst_start: u32,
    pub colour_burst_end: u32,
    pub blanking_16b_ire: u16,
    pub black_16b_ire: u16,
    pub white_16b_ire: u16,
    pub number_of_sequential_fields: u32,
    pub is_widescreen: bool,
    pub is_subcarrier_locked: bool,
    pub is_mapped: bool,
    pub decoder: String,
}

impl VideoParameters {
    /// A full-width line filled with the blanking level, used by every wrapper
    /// that synthesizes padding fields.
    #[must_use]
    pub fn blanking_fill_line(&self) -> Vec<u16> {
        vec![self.blanking_16b_ire; self.field_width as usize]
    }

    #[must_use]
    pub fn pal_default() -> Self {
        Self {
            system: VideoSystem::Pal,
            field_width: 1135,
            field_height: 313,
            active_video_start: 185,
            active_video_end: 1107,
            first_active_field_line: 22,
            last_active_field_line: 308,
            colour_burst_start: 98,
            colour_burst_end: 138,
            blanking_16b_ire: 16384,
            black_16b_ire: 16384,
            white_16b_ire: 57344,
            number_of_sequential_fields: 0,
            is_widescreen: false,
            is_subcarrier_locked: true,
            is_mapped: false,
            decoder: "ld-decode".to_string(),
        }
    }

    #[must_use]
    pub fn ntsc_default() -> Self {
        Self {
            system: VideoSystem::Ntsc,
            field_width: 910,
            field_height: 263,
            active_video_start: 148,
            active_video_end: 892,
            first_active_field_line: 20,
            last_active_field_line: 259,
            colour_burst_start: 78,
            colour_burst_end: 110,
            blanking_16b_ire: 16384,
            black_16b_ire: 16384,
            white_16b_ire: 57344,
            number_of_sequential_fields: 0,
            is_widescreen: false,
            is_subcarrier_locked: true,
            is_mapped: false,
            decoder: "ld-decode".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blanking_fill_line_has_field_width_length() {
        let vp = VideoParameters::pal_default();
        let line = vp.blanking_fill_line();
        assert_eq!(line.len(), vp.field_width as usize);
        assert!(line.iter().all(|&s| s == vp.blanking_16b_ire));
    }
}
