//! Indonesian phone number normalisation.

/// Digits only, in international `62…` form: `0812…` and `812…` both become
/// `62812…`. Numbers already starting with `62` (or anything else) are kept.
pub fn format_phone_number(number: &str) -> String {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();

    if let Some(rest) = digits.strip_prefix('0') {
        format!("62{rest}")
    } else if digits.starts_with('8') {
        format!("62{digits}")
    } else {
        digits
    }
}

/// Local `0…` form for display.
pub fn format_phone_for_display(number: &str) -> String {
    let phone = format_phone_number(number);
    match phone.strip_prefix("62") {
        Some(rest) => format!("0{rest}"),
        None => phone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_prefix_becomes_international() {
        assert_eq!(format_phone_number("0812-3456-789"), "628123456789");
        assert_eq!(format_phone_number("812 3456 789"), "628123456789");
        assert_eq!(format_phone_number("+62 812 3456 789"), "628123456789");
    }

    #[test]
    fn other_numbers_only_stripped() {
        assert_eq!(format_phone_number("+1 (555) 010-9999"), "15550109999");
        assert_eq!(format_phone_number(""), "");
        assert_eq!(format_phone_number("abc"), "");
    }

    #[test]
    fn display_form() {
        assert_eq!(format_phone_for_display("628123456789"), "08123456789");
        assert_eq!(format_phone_for_display("0812 3456 789"), "08123456789");
        assert_eq!(format_phone_for_display("15550109999"), "15550109999");
    }
}
