//! `Range` request header handling.
//!
//! Only a single `bytes=` range is honoured. Anything else (other units,
//! several ranges, syntax errors) is ignored and the full body is served.

use axum::http::HeaderValue;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeRequest {
    Full,
    Partial(Range<u64>),
    Unsatisfiable,
}

pub fn parse_range(header: Option<&HeaderValue>, size: u64) -> RangeRequest {
    let Some(ranges) = header
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("bytes="))
    else {
        return RangeRequest::Full;
    };
    if ranges.contains(',') {
        return RangeRequest::Full;
    }
    let Some((start, end)) = ranges.trim().split_once('-') else {
        return RangeRequest::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // Suffix range: the last N bytes
        let Ok(len) = end.parse::<u64>() else {
            return RangeRequest::Full;
        };
        if len == 0 || size == 0 {
            return RangeRequest::Unsatisfiable;
        }
        return RangeRequest::Partial(size.saturating_sub(len)..size);
    }

    let Ok(start) = start.parse::<u64>() else {
        return RangeRequest::Full;
    };
    let end = if end.is_empty() {
        None
    } else {
        match end.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeRequest::Full,
        }
    };
    if start >= size {
        return RangeRequest::Unsatisfiable;
    }
    let end = end.map_or(size, |e| e.saturating_add(1).min(size));
    RangeRequest::Partial(start..end)
}
