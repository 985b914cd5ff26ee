/// Formats a number of bytes into a human-readable string.
///
/// This method converts a byte count into a string with appropriate units (B, KiB, MiB, etc.)
/// and a specified level of precision.
///
/// # Example
///
/// ```
/// use chanmirror_utils::bytes::format_bytes;
///
/// let bytes = 1024_u64.pow(2);
/// let formatted = format_bytes(bytes, 2);
///
/// assert_eq!(formatted, "1.00 MiB");
/// ```
pub fn format_bytes(bytes: u64, precision: usize) -> String {
    let unit = 1024.0;
    let sizes = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    if bytes == 0 {
        return format!("{:.*} {}", precision, 0.0, sizes[0]);
    }

    let idx = (bytes as f64).log(unit).floor() as usize;
    let idx = idx.min(sizes.len() - 1);

    format!(
        "{:.*} {}",
        precision,
        bytes as f64 / unit.powi(idx as i32),
        sizes[idx]
    )
}
