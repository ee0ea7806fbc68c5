//! Text form of a partition, used to save and restore in-flight downloads.
//!
//! The blob is a list of `start:end,` pairs in part order, e.g.
//! `0:250,250:500,`.

use crate::error::{DownloadError, Result};
use crate::part::PartData;

pub fn encode(parts: &[PartData]) -> String {
    let mut out = String::new();
    for part in parts {
        out.push_str(&format!("{}:{},", part.start, part.end));
    }
    out
}

/// Decode a blob produced by [`encode`].
///
/// The trailing separator and surrounding whitespace are optional. Nothing is
/// returned unless every pair parses and the pairs form a contiguous
/// partition starting at offset 0.
pub fn decode(blob: &str) -> Result<Vec<PartData>> {
    let body = blob.trim();
    let body = body.strip_suffix(',').unwrap_or(body);
    if body.is_empty() {
        return Err(corrupt("state is empty"));
    }

    let mut parts = Vec::new();
    for (index, pair) in body.split(',').enumerate() {
        let (start, end) = pair
            .split_once(':')
            .ok_or_else(|| corrupt(format!("part {} has no ':' separator: {:?}", index, pair)))?;
        let start = parse_offset(index, start)?;
        let end = parse_offset(index, end)?;
        parts.push(PartData::new(start, end));
    }

    let mut origin = 0;
    for (index, part) in parts.iter().enumerate() {
        if part.start < origin || part.start > part.end {
            return Err(corrupt(format!(
                "part {} range {}:{} does not follow previous end {}",
                index, part.start, part.end, origin
            )));
        }
        origin = part.end;
    }

    Ok(parts)
}

fn parse_offset(index: usize, field: &str) -> Result<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(corrupt(format!("part {} has non-numeric offset {:?}", index, field)));
    }
    field
        .parse::<u64>()
        .map_err(|_| corrupt(format!("part {} has non-numeric offset {:?}", index, field)))
}

fn corrupt(msg: impl Into<String>) -> DownloadError {
    DownloadError::StateCorrupt(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::plan_partition;

    #[test]
    fn test_encode_two_parts() {
        let parts = vec![PartData::new(0, 250), PartData::new(250, 500)];
        assert_eq!(encode(&parts), "0:250,250:500,");
        assert_eq!(decode("0:250,250:500,").unwrap(), parts);
    }

    #[test]
    fn test_planned_partitions_survive_a_save() {
        for (total, tasks) in [(1000, 4), (10, 3), (2, 4), (1, 1), (987_654_321, 16)] {
            let parts = plan_partition(total, tasks).unwrap();
            assert_eq!(decode(&encode(&parts)).unwrap(), parts);
        }
    }

    #[test]
    fn test_in_flight_offsets_are_kept() {
        let parts = vec![
            PartData::new(120, 250),
            PartData::new(500, 500),
            PartData::new(600, 750),
        ];
        assert_eq!(decode(&encode(&parts)).unwrap(), parts);
    }

    #[test]
    fn test_missing_trailing_separator_and_newline() {
        let parts = decode("0:4,4:7,7:10\n").unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], PartData::new(7, 10));
    }

    #[test]
    fn test_malformed_blobs_are_corrupt() {
        for blob in [
            "",
            ",",
            "0-250,",
            "0:250:300,",
            "0:abc,",
            "0:250,,250:500,",
            "-1:250,",
            "+0:250,",
            "0:+250,",
            "0: 250,",
            "0:18446744073709551616,",
            "0:250,250:500,x",
        ] {
            let err = decode(blob).unwrap_err();
            assert!(
                matches!(err, DownloadError::StateCorrupt(_)),
                "{:?} decoded",
                blob
            );
        }
    }

    #[test]
    fn test_broken_partition_is_corrupt() {
        // start past end
        assert!(decode("300:250,").is_err());
        // overlaps the previous part
        assert!(decode("0:250,200:500,").is_err());
    }
}
