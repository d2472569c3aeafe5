use chrono::NaiveDate;

/// Gate for scheduled-event files: the name must carry a `DD_MM_YY_<title>`
/// or `DD_MM_YYYY_<title>` prefix and the embedded date must be `today`.
/// Event files without a parseable date prefix are excluded.
pub fn event_file_is_current(file_name: &str, today: NaiveDate) -> bool {
    parse_date_prefix(file_name) == Some(today)
}

fn parse_date_prefix(file_name: &str) -> Option<NaiveDate> {
    let mut parts = file_name.splitn(4, '_');
    let day = parts.next()?;
    let month = parts.next()?;
    let year_part = parts.next()?;

    // The year may be glued to the extension when there is no title
    // segment, e.g. "05_03_25.pdf".
    let year_digits: String = year_part.chars().take_while(|c| c.is_ascii_digit()).collect();

    if day.len() != 2 || month.len() != 2 {
        return None;
    }
    let day: u32 = day.parse().ok()?;
    let month: u32 = month.parse().ok()?;

    let year: i32 = match year_digits.len() {
        2 => 2000 + year_digits.parse::<i32>().ok()?,
        4 => year_digits.parse().ok()?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}
