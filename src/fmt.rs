//! Provides formatting and parsing helpers for byte sizes.

/// Formats a given size in bytes.
///
/// This function determines the ideal unit (ranging from bytes to petabytes) to provide
/// a concise representation.
///
/// # Examples
///
/// ```
/// assert_eq!(peercache::fmt::format_size(0), "0 bytes");
/// assert_eq!(peercache::fmt::format_size(1), "1 byte");
/// assert_eq!(peercache::fmt::format_size(100), "100 bytes");
/// assert_eq!(peercache::fmt::format_size(8_734), "8.53 KiB");
/// assert_eq!(peercache::fmt::format_size(87_340), "85.3 KiB");
/// assert_eq!(peercache::fmt::format_size(8_734_000), "8.33 MiB");
/// assert_eq!(peercache::fmt::format_size(8_734_000_000), "8.13 GiB");
/// ```
pub fn format_size(size_in_bytes: usize) -> String {
    if size_in_bytes == 1 {
        return "1 byte".to_owned();
    } else if size_in_bytes < 1024 {
        return format!("{} bytes", size_in_bytes);
    }

    let mut magnitude = 0;
    let mut size = size_in_bytes as f32;
    while size > 1024. && magnitude < 5 {
        size /= 1024.;
        magnitude += 1;
    }

    let unit = match magnitude {
        1 => "KiB",
        2 => "MiB",
        3 => "GiB",
        4 => "TiB",
        _ => "PiB",
    };

    if size <= 10. {
        format!("{:.2} {}", size, unit)
    } else if size <= 100. {
        format!("{:.1} {}", size, unit)
    } else {
        format!("{:.0} {}", size, unit)
    }
}

/// Parses a size in bytes from a given string.
///
/// This string can have the following suffixes:
/// * **b** or **B**: treats the value as bytes
/// * **k** or **K**: treats the value as kilobytes (factor 1024)
/// * **m** or **M**: treats the value as megabytes
/// * **g** or **G**: treats the value as gigabytes
/// * **t** or **T**: treats the value as terabytes
///
/// Returns an **Err** if either a non-integer value is given or if an unknown suffix was
/// provided.
///
/// # Examples
///
/// ```
/// assert_eq!(peercache::fmt::parse_size("100").unwrap(), 100);
/// assert_eq!(peercache::fmt::parse_size("100b").unwrap(), 100);
/// assert_eq!(peercache::fmt::parse_size("8k").unwrap(), 8192);
/// assert_eq!(peercache::fmt::parse_size("8m").unwrap(), 8 * 1024 * 1024);
/// assert_eq!(peercache::fmt::parse_size("4 G").unwrap(), 4 * 1024 * 1024 * 1024);
///
/// // Unknown suffixes are rejected...
/// assert_eq!(peercache::fmt::parse_size("3 Y").is_err(), true);
///
/// // ...just like non-integer values.
/// assert_eq!(peercache::fmt::parse_size("1.2g").is_err(), true);
/// assert_eq!(peercache::fmt::parse_size("-1").is_err(), true);
/// ```
pub fn parse_size(input: impl AsRef<str>) -> anyhow::Result<usize> {
    lazy_static::lazy_static! {
        static ref NUMBER_AND_SUFFIX: regex::Regex =
            regex::Regex::new(r"^ *(\d+) *([bBkKmMgGtT]?) *$").unwrap();
    }

    match NUMBER_AND_SUFFIX.captures(input.as_ref()) {
        Some(captures) => {
            let number = captures[1].parse::<usize>()?;
            match &captures[2] {
                "k" | "K" => Ok(number * 1024),
                "m" | "M" => Ok(number * 1024 * 1024),
                "g" | "G" => Ok(number * 1024 * 1024 * 1024),
                "t" | "T" => Ok(number * 1024 * 1024 * 1024 * 1024),
                _ => Ok(number),
            }
        }
        None => Err(anyhow::anyhow!(
            "Cannot parse '{}' into a size expression. \
             Expected a positive number and optionally 'b', 'k', 'm', 'g' or 't' as suffix.",
            input.as_ref()
        )),
    }
}
