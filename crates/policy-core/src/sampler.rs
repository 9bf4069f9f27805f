// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic consistent-probability sampling and W3C `tracestate`
//! merging.
//!
//! The sampler is a pure function: given a trace id, an existing
//! `tracestate`, and a policy's sample configuration, it returns a keep/drop
//! decision plus the `tracestate` to write back. It holds no state of its
//! own and touches no shared registry state, so it needs no locking and no
//! `&mut self`.
//!
//! The threshold math and `tracestate` grammar follow the W3C Trace Context
//! consistent-probability-sampling scheme directly, rather than a prior
//! implementation.

/// One policy's sampling configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleConfig {
    /// Keep percentage in `(0, 100]`.
    pub percentage: f64,
    /// Sampling mode.
    pub mode: SampleMode,
    /// Resolution, in hex digits of the 56-bit threshold, in `[1, 14]`.
    pub precision: u32,
    /// Whether an absent/malformed trace id drops the record instead of
    /// keeping it unconditionally.
    pub fail_closed: bool,
}

/// Consistent-sampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Threshold is the policy's own; an incoming `th` is ignored.
    Proportional,
    /// Threshold is `max(incoming th, policy th)`.
    Equalizing,
}

/// The sampler's verdict for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleOutcome {
    /// Whether the record survives sampling.
    pub keep: bool,
    /// The `tracestate` to write back, if the record carries one (spans
    /// only; `tracestate` is read and written back as raw text, never
    /// parsed beyond the `ot=` vendor entry this sampler owns).
    pub tracestate: Option<String>,
}

const THRESHOLD_BITS: u32 = 56;
const THRESHOLD_HEX_DIGITS: u32 = 14; // 56 / 4

/// Computes the 56-bit rejection threshold `T = round((1 - p/100) * 2^56)`,
/// quantized to `precision` hex digits of resolution.
#[must_use]
pub fn compute_threshold(percentage: f64, precision: u32) -> u64 {
    let keep_fraction = (percentage / 100.0).clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let raw = ((1.0 - keep_fraction) * (1u64 << THRESHOLD_BITS) as f64).round() as u64;
    let precision = precision.clamp(1, THRESHOLD_HEX_DIGITS);
    if precision >= THRESHOLD_HEX_DIGITS {
        raw
    } else {
        let shift = (THRESHOLD_HEX_DIGITS - precision) * 4;
        (raw >> shift) << shift
    }
}

/// Extracts the low 56 bits of a 16-byte trace id, big-endian, as `R`.
#[must_use]
pub fn low56_of_trace_id(trace_id: &[u8; 16]) -> u64 {
    let mut buf = [0u8; 8];
    buf[1..8].copy_from_slice(&trace_id[9..16]);
    u64::from_be_bytes(buf)
}

/// Deterministic 56-bit fallback dice value for signals without a trace id,
/// derived from a configured key attribute's string value (FNV-1a, folded
/// to 56 bits). Backs the `sample.key` field for logs and metrics, which
/// have no trace id of their own to roll the dice on; see `DESIGN.md`.
#[must_use]
pub fn hash56(key_value: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key_value.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash & 0x00ff_ffff_ffff_ffff
}

fn format_threshold_hex(t: u64) -> String {
    let full = format!("{t:014x}");
    let trimmed = full.trim_end_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn format_rv_hex(r: u64) -> String {
    format!("{r:014x}")
}

fn parse_threshold_hex(hex: &str) -> Option<u64> {
    if hex.is_empty() || hex.len() > THRESHOLD_HEX_DIGITS as usize {
        return None;
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut padded = hex.to_string();
    while padded.len() < THRESHOLD_HEX_DIGITS as usize {
        padded.push('0');
    }
    u64::from_str_radix(&padded, 16).ok()
}

/// One `key:value` sub-entry of the `ot=` vendor.
struct OtSubkeys {
    /// All sub-keys except `th`/`rv`, in original order.
    other: Vec<(String, String)>,
    th: Option<u64>,
    rv: Option<String>,
}

/// All non-`ot` vendor entries, verbatim, in original order.
struct ParsedTraceState {
    ot: OtSubkeys,
    other_vendors: Vec<String>,
}

fn parse_tracestate(input: &str) -> ParsedTraceState {
    let mut ot = OtSubkeys {
        other: Vec::new(),
        th: None,
        rv: None,
    };
    let mut other_vendors = Vec::new();
    let mut found_ot = false;

    for entry in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((vendor, value)) = entry.split_once('=') else {
            // Malformed vendor entry: drop it silently, never surfaced as
            // an error. The sampler never fails a record on bad input.
            continue;
        };
        if vendor == "ot" && !found_ot {
            found_ot = true;
            for sub in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                let Some((k, v)) = sub.split_once(':') else {
                    continue;
                };
                match k {
                    "th" => ot.th = parse_threshold_hex(v),
                    "rv" => ot.rv = Some(v.to_string()),
                    _ => ot.other.push((k.to_string(), v.to_string())),
                }
            }
        } else {
            other_vendors.push(entry.to_string());
        }
    }

    ParsedTraceState { ot, other_vendors }
}

fn render_tracestate(ot: &OtSubkeys, effective_threshold: u64, rv: &str, other_vendors: &[String]) -> String {
    let mut subkeys: Vec<String> = ot.other.iter().map(|(k, v)| format!("{k}:{v}")).collect();
    subkeys.push(format!("rv:{rv}"));
    subkeys.push(format!("th:{}", format_threshold_hex(effective_threshold)));

    let mut out = format!("ot={}", subkeys.join(";"));
    for vendor in other_vendors {
        out.push(',');
        out.push_str(vendor);
    }
    out
}

/// Runs the consistent-sampling decision for one record.
///
/// `trace_id` is the record's binary trace id, if it has one. `key_value` is
/// the configured dice-source attribute's value when `trace_id` is absent
/// (logs/metrics). `existing_tracestate` is the raw, as-read `tracestate`
/// text (spans only; pass `None` for log/metric signals).
#[must_use]
pub fn sample(
    cfg: &SampleConfig,
    trace_id: Option<[u8; 16]>,
    key_value: Option<&str>,
    existing_tracestate: Option<&str>,
) -> SampleOutcome {
    let r = trace_id
        .map(|id| low56_of_trace_id(&id))
        .or_else(|| key_value.map(hash56));

    let Some(r) = r else {
        return SampleOutcome {
            keep: !cfg.fail_closed,
            tracestate: None,
        };
    };

    let policy_threshold = compute_threshold(cfg.percentage, cfg.precision);
    let parsed = existing_tracestate.map(parse_tracestate);

    let existing_th = parsed.as_ref().and_then(|p| p.ot.th);
    let effective_threshold = match cfg.mode {
        SampleMode::Proportional => policy_threshold,
        SampleMode::Equalizing => existing_th.unwrap_or(0).max(policy_threshold),
    };

    let keep = r >= effective_threshold;

    // tracestate is only meaningful for spans; callers for log/metric
    // signals simply discard `tracestate` on the returned outcome.
    let tracestate = if trace_id.is_some() {
        let rv = parsed
            .as_ref()
            .and_then(|p| p.ot.rv.clone())
            .unwrap_or_else(|| format_rv_hex(r));
        let other = parsed.as_ref().map(|p| p.ot.other.clone()).unwrap_or_default();
        let other_vendors = parsed.map(|p| p.other_vendors).unwrap_or_default();
        Some(render_tracestate(
            &OtSubkeys {
                other,
                th: None,
                rv: None,
            },
            effective_threshold,
            &rv,
            &other_vendors,
        ))
    } else {
        None
    };

    SampleOutcome { keep, tracestate }
}
