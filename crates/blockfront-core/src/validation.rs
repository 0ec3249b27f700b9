//! Coercion of untrusted client input into bounded, typed values.
//!
//! Every function either returns a value that is safe to store or a named
//! [`Rejection`]. Callers on fire-and-forget paths drop the whole event on
//! any rejection.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use crate::block::{BlockAction, BlockMutation, COORD_LIMIT, MAX_BLOCK_TYPE, MIN_BLOCK_TYPE};
use crate::net::messages::{BlockEditMsg, PositionSyncMsg};
use crate::player::{MAX_NAME_CHARS, PlayerId, PlayerPose, Team};

/// Largest absolute position accepted on any axis; larger values are clamped.
pub const POSITION_LIMIT: f64 = 4096.0;

/// Longest chat message kept after sanitizing.
pub const MAX_CHAT_CHARS: usize = 200;

/// Name used when a client sends nothing usable.
pub const FALLBACK_NAME: &str = "Player";

/// A scalar exactly as the client sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Why a piece of input was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Missing,
    NotANumber,
    OutOfRange,
    UnknownVariant(String),
    Empty,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing value"),
            Self::NotANumber => write!(f, "not a number"),
            Self::OutOfRange => write!(f, "out of range"),
            Self::UnknownVariant(v) => write!(f, "unknown variant: {v}"),
            Self::Empty => write!(f, "empty value"),
        }
    }
}

impl std::error::Error for Rejection {}

/// Read a finite number out of a loose scalar.
pub fn coerce_number(value: Option<&Loose>) -> Result<f64, Rejection> {
    let n = match value.ok_or(Rejection::Missing)? {
        Loose::Bool(b) => f64::from(u8::from(*b)),
        Loose::Int(i) => *i as f64,
        Loose::Float(f) => *f,
        Loose::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(Rejection::Empty);
            }
            s.parse::<f64>().map_err(|_| Rejection::NotANumber)?
        },
    };
    if n.is_finite() {
        Ok(n)
    } else {
        Err(Rejection::NotANumber)
    }
}

/// Truncate toward zero and require the result to lie in `min..=max`.
pub fn parse_bounded_int(value: Option<&Loose>, min: i32, max: i32) -> Result<i32, Rejection> {
    let t = coerce_number(value)?.trunc();
    if t < f64::from(min) || t > f64::from(max) {
        return Err(Rejection::OutOfRange);
    }
    Ok(t as i32)
}

/// Clamp a number into `min..=max`.
pub fn parse_clamped(value: Option<&Loose>, min: f64, max: f64) -> Result<f64, Rejection> {
    Ok(coerce_number(value)?.clamp(min, max))
}

/// Wrap a heading into `[-π, π)`.
pub fn parse_angle(value: Option<&Loose>) -> Result<f64, Rejection> {
    Ok((coerce_number(value)? + PI).rem_euclid(TAU) - PI)
}

/// Clamp a look angle to straight up / straight down.
pub fn parse_pitch(value: Option<&Loose>) -> Result<f64, Rejection> {
    parse_clamped(value, -FRAC_PI_2, FRAC_PI_2)
}

/// Read a player id: a non-negative integer.
pub fn parse_player_id(value: Option<&Loose>) -> Result<PlayerId, Rejection> {
    let n = coerce_number(value)?;
    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(Rejection::OutOfRange);
    }
    Ok(n as PlayerId)
}

pub fn parse_team(value: Option<&str>) -> Result<Team, Rejection> {
    let raw = value.ok_or(Rejection::Missing)?.trim();
    Team::ALL
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(raw))
        .ok_or_else(|| Rejection::UnknownVariant(raw.to_string()))
}

pub fn parse_block_action(value: Option<&str>) -> Result<BlockAction, Rejection> {
    let raw = value.ok_or(Rejection::Missing)?.trim();
    [BlockAction::Place, BlockAction::Remove]
        .into_iter()
        .find(|a| a.as_str().eq_ignore_ascii_case(raw))
        .ok_or_else(|| Rejection::UnknownVariant(raw.to_string()))
}

/// Strip control characters, collapse whitespace and cap the length.
pub fn sanitize_name(raw: Option<&str>) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let name: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    let name = name.trim_end().to_string();
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

pub fn sanitize_chat(raw: Option<&str>) -> Result<String, Rejection> {
    let cleaned: String = raw
        .ok_or(Rejection::Missing)?
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let text: String = cleaned.trim().chars().take(MAX_CHAT_CHARS).collect();
    if text.is_empty() {
        return Err(Rejection::Empty);
    }
    Ok(text)
}

/// Turn a raw block edit into a stored mutation.
pub fn validate_block_edit(raw: &BlockEditMsg) -> Result<BlockMutation, Rejection> {
    let action = parse_block_action(raw.action.as_deref())?;
    let x = parse_bounded_int(raw.x.as_ref(), -COORD_LIMIT, COORD_LIMIT)?;
    let y = parse_bounded_int(raw.y.as_ref(), -COORD_LIMIT, COORD_LIMIT)?;
    let z = parse_bounded_int(raw.z.as_ref(), -COORD_LIMIT, COORD_LIMIT)?;
    match action {
        BlockAction::Place => {
            let type_id = parse_bounded_int(
                raw.type_id.as_ref(),
                i32::from(MIN_BLOCK_TYPE),
                i32::from(MAX_BLOCK_TYPE),
            )?;
            Ok(BlockMutation::place(x, y, z, type_id as u8))
        },
        BlockAction::Remove => Ok(BlockMutation::remove(x, y, z)),
    }
}

/// Turn a raw position sync into a pose stamped with `now`.
pub fn validate_pose(raw: &PositionSyncMsg, now: u64) -> Result<PlayerPose, Rejection> {
    Ok(PlayerPose {
        x: parse_clamped(raw.x.as_ref(), -POSITION_LIMIT, POSITION_LIMIT)?,
        y: parse_clamped(raw.y.as_ref(), -POSITION_LIMIT, POSITION_LIMIT)?,
        z: parse_clamped(raw.z.as_ref(), -POSITION_LIMIT, POSITION_LIMIT)?,
        yaw: parse_angle(raw.yaw.as_ref())?,
        pitch: parse_pitch(raw.pitch.as_ref())?,
        updated_at: now,
    })
}
