use serde::Serialize;

/// Seconds as `HH:MM:SS`; hours are not wrapped at 24.
pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Seconds as `HH:MM`, used for single activities.
pub fn format_hours_minutes(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    format!("{:02}:{:02}", total_seconds / 3600, (total_seconds % 3600) / 60)
}

/// Fixed decimals with `,` thousands separators: `1234.56` → `1,234.6`.
pub fn format_number(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::with_capacity(formatted.len() + integer.len() / 3 + 1);
    let is_zero = formatted.bytes().all(|b| b == b'0' || b == b'.');
    if value.is_sign_negative() && !is_zero {
        out.push('-');
    }
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// JSON that can sit inside a `<script>` element.
pub fn script_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}
