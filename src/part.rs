use std::path::{Path, PathBuf};

use crate::error::{DownloadError, Result};

/// One contiguous byte range of the remote resource.
///
/// `start` is the next offset to fetch and moves forward as bytes are
/// written to the part artifact; `end` is exclusive and never changes
/// after planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartData {
    pub start: u64,
    pub end: u64,
}

impl PartData {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_finished(&self) -> bool {
        self.start >= self.end
    }
}

/// Split `total_size` bytes into `task_count` contiguous parts.
///
/// The first `total_size % task_count` parts get one extra byte, so part
/// sizes differ by at most one. Saved state depends on this layout.
pub fn plan_partition(total_size: u64, task_count: usize) -> Result<Vec<PartData>> {
    if total_size == 0 {
        return Err(DownloadError::InvalidResource(
            "remote resource reported an empty or unknown length".into(),
        ));
    }
    if task_count == 0 {
        return Err(DownloadError::InvalidConfig(
            "task count must be greater than 0".into(),
        ));
    }

    let count = task_count as u64;
    let base = total_size / count;
    let remainder = total_size % count;

    let mut parts = Vec::with_capacity(task_count);
    let mut start = 0;
    for i in 0..count {
        let size = if i < remainder { base + 1 } else { base };
        parts.push(PartData::new(start, start + size));
        start += size;
    }

    Ok(parts)
}

/// Offset at which each part began when the partition was planned.
///
/// Parts are contiguous, so a part's origin is the previous part's `end`.
pub fn part_origins(parts: &[PartData]) -> Vec<u64> {
    let mut origins = Vec::with_capacity(parts.len());
    let mut origin = 0;
    for part in parts {
        origins.push(origin);
        origin = part.end;
    }
    origins
}

/// Size of the resource covered by a partition.
pub fn total_size(parts: &[PartData]) -> u64 {
    parts.last().map(|p| p.end).unwrap_or(0)
}

/// Intermediate artifact for part `index`: `<path>.<index>`.
pub fn part_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(parts: &[PartData]) -> Vec<(u64, u64)> {
        parts.iter().map(|p| (p.start, p.end)).collect()
    }

    #[test]
    fn test_even_split() {
        let parts = plan_partition(1000, 4).unwrap();
        assert_eq!(
            ranges(&parts),
            vec![(0, 250), (250, 500), (500, 750), (750, 1000)]
        );
    }

    #[test]
    fn test_remainder_goes_to_first_parts() {
        let parts = plan_partition(10, 3).unwrap();
        assert_eq!(ranges(&parts), vec![(0, 4), (4, 7), (7, 10)]);

        let parts = plan_partition(11, 4).unwrap();
        assert_eq!(ranges(&parts), vec![(0, 3), (3, 6), (6, 9), (9, 11)]);
    }

    #[test]
    fn test_empty_resource_is_rejected() {
        let err = plan_partition(0, 4).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidResource(_)));
    }

    #[test]
    fn test_zero_tasks_is_rejected() {
        let err = plan_partition(100, 0).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidConfig(_)));
    }

    #[test]
    fn test_more_tasks_than_bytes() {
        let parts = plan_partition(2, 4).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(ranges(&parts), vec![(0, 1), (1, 2), (2, 2), (2, 2)]);
        assert!(parts[2].is_finished());
        assert!(parts[3].is_finished());
    }

    #[test]
    fn test_partition_covers_resource() {
        for total in 1..200u64 {
            for tasks in 1..12usize {
                let parts = plan_partition(total, tasks).unwrap();
                assert_eq!(parts.len(), tasks);
                assert_eq!(parts[0].start, 0);
                assert_eq!(total_size(&parts), total);
                for pair in parts.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }
                let sizes: Vec<u64> = parts.iter().map(|p| p.remaining()).collect();
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                assert!(max - min <= 1, "total={} tasks={}", total, tasks);
            }
        }
    }

    #[test]
    fn test_origins_follow_previous_end() {
        let parts = vec![
            PartData::new(100, 250),
            PartData::new(250, 500),
            PartData::new(510, 750),
        ];
        assert_eq!(part_origins(&parts), vec![0, 250, 500]);
    }

    #[test]
    fn test_part_path_appends_index() {
        let path = Path::new("/tmp/video.mp4");
        assert_eq!(part_path(path, 3), PathBuf::from("/tmp/video.mp4.3"));
    }
}
