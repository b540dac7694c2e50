// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Encoder control files.
//!
//! A control file holds one `key = value;` assignment per line. Lookups keep
//! a read cursor: a key is searched from the line after the previous match to
//! the end of the file, and once more from the top if that fails. A line
//! matches when it starts with the key, so `quant_min` also matches a
//! `quant_min_Ivop_under_range` line. The value starts two characters after
//! the `=` and ends at the next `;`.

use crate::{
    error::{Error, Result},
    format::{ChromaLayout, VideoFormat},
};
use std::{fs, path::Path};
use tracing::{debug, trace, warn};

#[derive(Clone, Debug)]
pub struct ControlFile {
    path: String,
    lines: Vec<String>,
    cursor: usize,
}

impl ControlFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(path.display().to_string(), &text))
    }

    /// Control file from in-memory text; `path` only labels errors.
    pub fn parse(path: impl Into<String>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: text.lines().map(str::to_string).collect(),
            cursor: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw value text of the next line starting with `key`.
    ///
    /// `Ok(None)` when no line matches. A matching line without `=` or `;`
    /// is a [`Error::ControlSyntax`]; the cursor still moves past it.
    pub fn find(&mut self, key: &str) -> Result<Option<String>> {
        let len = self.lines.len();
        let start = self.cursor.min(len);
        let hit = (start..len)
            .chain(0..len)
            .find(|&i| self.lines[i].starts_with(key));
        let Some(index) = hit else {
            trace!(key, "not found");
            self.cursor = len;
            return Ok(None);
        };
        self.cursor = index + 1;

        let line = &self.lines[index];
        let syntax = |problem| Error::ControlSyntax {
            path: self.path.clone(),
            key: key.to_string(),
            problem,
        };
        let eq = line[key.len()..]
            .find('=')
            .map(|pos| key.len() + pos)
            .ok_or_else(|| syntax("has no '='"))?;
        let value = line.get(eq + 2..).unwrap_or_default();
        let end = value
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == ';')
            .map(|(pos, _)| pos)
            .ok_or_else(|| syntax("has no ';'"))?;
        Ok(Some(value[..end].to_string()))
    }

    /// Integer value of `key`, parsed like C `atoi`.
    pub fn value(&mut self, key: &str) -> Result<Option<i64>> {
        Ok(self.find(key)?.map(|text| atoi(&text)))
    }

    /// Like [`ControlFile::value`] but treats malformed lines as absent,
    /// with a warning.
    pub fn lenient_value(&mut self, key: &str) -> Option<i64> {
        match self.value(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }
}

/// Leading integer of `text`: optional whitespace and sign, then digits.
/// Anything unparsable is 0.
pub fn atoi(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.wrapping_mul(10).wrapping_add((d - b'0') as i64));
    if negative {
        -value
    } else {
        value
    }
}

/// Stream settings at the top of a control file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamHeader {
    pub stream_type: Option<i64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<i64>,
    pub chroma: ChromaLayout,
}

impl StreamHeader {
    pub fn read(file: &mut ControlFile) -> Self {
        let header = Self {
            stream_type: file.lenient_value("stream_type"),
            width: file.lenient_value("x_pic_size").map(|v| v as u32),
            height: file.lenient_value("y_pic_size").map(|v| v as u32),
            frame_rate: file.lenient_value("frame_rate"),
            chroma: file
                .lenient_value("yuv_CbCr_format")
                .map(ChromaLayout::from_control)
                .unwrap_or_default(),
        };
        debug!(?header, "control file {}", file.path());
        header
    }

    pub fn format(&self) -> Option<VideoFormat> {
        self.stream_type.and_then(VideoFormat::from_stream_type)
    }
}

/// A control file key and the encoder setter it feeds, named without the
/// `shcodecs_encoder_set_` prefix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Knob {
    pub key: &'static str,
    pub setter: &'static str,
}

const fn knob(key: &'static str, setter: &'static str) -> Knob {
    Knob { key, setter }
}

/// Applied to every stream.
pub const COMMON_KNOBS: &[Knob] = &[
    knob("bitrate", "bitrate"),
    knob("I_vop_interval", "I_vop_interval"),
    knob("mv_mode", "mv_mode"),
    knob("fcode_forward", "fcode_forward"),
    knob("search_mode", "search_mode"),
    knob("search_time_fixed", "search_time_fixed"),
    knob("rate_ctrl_skip_enable", "ratecontrol_skip_enable"),
    knob("rate_ctrl_use_prevquant", "ratecontrol_use_prevquant"),
    knob("rate_ctrl_respect_type ", "ratecontrol_respect_type"),
    knob("rate_ctrl_intra_thr_changeable", "ratecontrol_intra_thr_changeable"),
    knob("control_bitrate_length", "control_bitrate_length"),
    knob("intra_macroblock_refresh_cycle", "intra_macroblock_refresh_cycle"),
    knob("video_format", "video_format"),
    knob("frame_num_resolution", "frame_num_resolution"),
    knob("noise_reduction", "noise_reduction"),
    knob("reaction_param_coeff", "reaction_param_coeff"),
    knob("weightedQ_mode", "weightedQ_mode"),
];

pub const H264_KNOBS: &[Knob] = &[
    knob("Ivop_quant_initial_value", "h264_Ivop_quant_initial_value"),
    knob("Pvop_quant_initial_value", "h264_Pvop_quant_initial_value"),
    knob("use_dquant", "h264_use_dquant"),
    knob("clip_dquant_next_mb", "h264_clip_dquant_next_mb"),
    knob("clip_dquant_frame", "h264_clip_dquant_frame"),
    knob("quant_min", "h264_quant_min"),
    knob("quant_min_Ivop_under_range", "h264_quant_min_Ivop_under_range"),
    knob("quant_max", "h264_quant_max"),
    knob("rate_ctrl_cpb_skipcheck_enable ", "h264_ratecontrol_cpb_skipcheck_enable"),
    knob("rate_ctrl_cpb_Ivop_noskip", "h264_ratecontrol_cpb_Ivop_noskip"),
    knob(
        "rate_ctrl_cpb_remain_zero_skip_enable",
        "h264_ratecontrol_cpb_remain_zero_skip_enable",
    ),
    knob("rate_ctrl_cpb_offset", "h264_ratecontrol_cpb_offset"),
    knob("rate_ctrl_cpb_offset_rate", "h264_ratecontrol_cpb_offset_rate"),
    knob("rate_ctrl_cpb_buffer_mode", "h264_ratecontrol_cpb_buffer_mode"),
    knob("rate_ctrl_cpb_max_size", "h264_ratecontrol_cpb_max_size"),
    knob("rate_ctrl_cpb_buffer_unit_size", "h264_ratecontrol_cpb_buffer_unit_size"),
    knob("intra_thr_1", "h264_intra_thr_1"),
    knob("intra_thr_2", "h264_intra_thr_2"),
    knob("sad_intra_bias", "h264_sad_intra_bias"),
    knob("regularly_inserted_I_type", "h264_regularly_inserted_I_type"),
    knob("call_unit", "h264_call_unit"),
    knob("use_slice", "h264_use_slice"),
    knob("slice_size_mb", "h264_slice_size_mb"),
    knob("slice_size_bit", "h264_slice_size_bit"),
    knob("slice_type_value_pattern", "h264_slice_type_value_pattern"),
    knob("use_mb_partition", "h264_use_mb_partition"),
    knob("mb_partition_vector_thr", "h264_mb_partition_vector_thr"),
    knob("deblocking_mode", "h264_deblocking_mode"),
    knob("use_deblocking_filter_control", "h264_use_deblocking_filter_control"),
    knob("deblocking_alpha_offset", "h264_deblocking_alpha_offset"),
    knob("deblocking_beta_offset", "h264_deblocking_beta_offset"),
    knob("me_skip_mode", "h264_me_skip_mode"),
    knob("put_start_code", "h264_put_start_code"),
    knob("param_changeable", "h264_param_changeable"),
    knob("changeable_max_bitrate", "h264_changeable_max_bitrate"),
    knob("seq_param_set_id", "h264_seq_param_set_id"),
    knob("profile", "h264_profile"),
    knob("constraint_set_flag", "h264_constraint_set_flag"),
    knob("level_type", "h264_level_type"),
    knob("level_value", "h264_level_value"),
    knob("out_vui_parameters", "h264_out_vui_parameters"),
    knob("chroma_qp_index_offset", "h264_chroma_qp_index_offset"),
    knob("constrained_intra_pred", "h264_constrained_intra_pred"),
    knob("ref_frame_num", "ref_frame_num"),
    knob("filler_output_on", "output_filler_enable"),
];

pub const MPEG4_KNOBS: &[Knob] = &[
    knob("out_vos", "mpeg4_out_vos"),
    knob("out_gov", "mpeg4_out_gov"),
    knob("aspect_ratio_info_type", "mpeg4_aspect_ratio_info_type"),
    knob("aspect_ratio_info_value", "mpeg4_aspect_ratio_info_value"),
    knob("vos_profile_level_type", "mpeg4_vos_profile_level_type"),
    knob("vos_profile_level_value", "mpeg4_vos_profile_level_value"),
    knob("out_visual_object_identifier", "mpeg4_out_visual_object_identifier"),
    knob("visual_object_verid", "mpeg4_visual_object_verid"),
    knob("visual_object_priority", "mpeg4_visual_object_priority"),
    knob("video_object_type_indication", "mpeg4_video_object_type_indication"),
    knob("out_object_layer_identifier", "mpeg4_out_object_layer_identifier"),
    knob("video_object_layer_verid", "mpeg4_video_object_layer_verid"),
    knob("video_object_layer_priority", "mpeg4_video_object_layer_priority"),
    knob("error_resilience_mode", "mpeg4_error_resilience_mode"),
    knob("video_packet_size_mb", "mpeg4_video_packet_size_mb"),
    knob("video_packet_size_bit", "mpeg4_video_packet_size_bit"),
    knob("video_packet_header_extention", "mpeg4_video_packet_header_extention"),
    knob("data_partitioned", "mpeg4_data_partitioned"),
    knob("reversible_vlc", "mpeg4_reversible_vlc"),
    knob("high_quality", "mpeg4_high_quality"),
    knob("param_changeable", "mpeg4_param_changeable"),
    knob("changeable_max_bitrate", "mpeg4_changeable_max_bitrate"),
    knob("Ivop_quant_initial_value", "mpeg4_Ivop_quant_initial_value"),
    knob("Pvop_quant_initial_value", "mpeg4_Pvop_quant_initial_value"),
    knob("use_dquant", "mpeg4_use_dquant"),
    knob("clip_dquant_frame", "mpeg4_clip_dquant_frame"),
    knob("quant_min", "mpeg4_quant_min"),
    knob("quant_min_Ivop_under_range", "mpeg4_quant_min_Ivop_under_range"),
    knob("quant_max", "mpeg4_quant_max"),
    knob("rate_ctrl_vbv_skipcheck_enable", "mpeg4_ratecontrol_vbv_skipcheck_enable"),
    knob("rate_ctrl_vbv_Ivop_noskip", "mpeg4_ratecontrol_vbv_Ivop_noskip"),
    knob(
        "rate_ctrl_vbv_remain_zero_skip_enable",
        "mpeg4_ratecontrol_vbv_remain_zero_skip_enable",
    ),
    knob("rate_ctrl_vbv_buffer_unit_size", "mpeg4_ratecontrol_vbv_buffer_unit_size"),
    knob("rate_ctrl_vbv_buffer_mode", "mpeg4_ratecontrol_vbv_buffer_mode"),
    knob("rate_ctrl_vbv_max_size", "mpeg4_ratecontrol_vbv_max_size"),
    knob("rate_ctrl_vbv_offset", "mpeg4_ratecontrol_vbv_offset"),
    knob("rate_ctrl_vbv_offset_rate", "mpeg4_ratecontrol_vbv_offset_rate"),
    knob("quant_type", "mpeg4_quant_type"),
    knob("use_AC_prediction", "mpeg4_use_AC_prediction"),
    knob("vop_min_mode", "mpeg4_vop_min_mode"),
    knob("vop_min_size", "mpeg4_vop_min_size"),
    knob("intra_thr", "mpeg4_intra_thr"),
    knob("b_vop_num", "mpeg4_b_vop_num"),
];

/// Knobs applied for `format`, in lookup order.
pub fn knobs(format: VideoFormat) -> impl Iterator<Item = &'static Knob> {
    let specific = match format {
        VideoFormat::H264 => H264_KNOBS,
        VideoFormat::Mpeg4 => MPEG4_KNOBS,
    };
    COMMON_KNOBS.iter().chain(specific)
}

/// Receiver of encoder knob values.
pub trait KnobTarget {
    fn set_knob(&mut self, setter: &str, value: i64) -> Result<()>;
}

/// Looks up every knob of `format` in `file` and passes the ones present to
/// `target`. Malformed lines are skipped with a warning. Returns the number
/// of knobs set.
pub fn apply_knobs(
    file: &mut ControlFile,
    format: VideoFormat,
    target: &mut dyn KnobTarget,
) -> Result<usize> {
    let mut applied = 0;
    for knob in knobs(format) {
        if let Some(value) = file.lenient_value(knob.key) {
            trace!(key = knob.key, value, "set_{}", knob.setter);
            target.set_knob(knob.setter, value)?;
            applied += 1;
        }
    }
    debug!(applied, "encoder knobs from {}", file.path());
    Ok(applied)
}
