//! Time-partitioned output paths
//!
//! Every cycle writes under `{root}/{year}/{month}/{day}/{hour}/{minute}/{file}`
//! using the UTC calendar fields of the instant the cycle ran. Fields are not
//! zero padded, so 2024-03-05T07:09Z lands in `2024/3/5/7/9`.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// `{year}/{month}/{day}/{hour}/{minute}` for a UTC instant
pub fn partition_path(instant: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        instant.year(),
        instant.month(),
        instant.day(),
        instant.hour(),
        instant.minute()
    )
}

/// Full store path for a cycle: root, partition and file name joined by `/`
///
/// Leading and trailing slashes on `root` are ignored; an empty root or file
/// name is skipped.
pub fn output_path(root: &str, instant: DateTime<Utc>, file_name: &str) -> String {
    let root = root.trim_matches('/');
    let file_name = file_name.trim_matches('/');

    let mut path = String::with_capacity(root.len() + file_name.len() + 20);
    if !root.is_empty() {
        path.push_str(root);
        path.push('/');
    }
    path.push_str(&partition_path(instant));
    if !file_name.is_empty() {
        path.push('/');
        path.push_str(file_name);
    }
    path
}
