//! Luhn checksum validation for order numbers.

/// Returns true when `number` is a non-empty digit string whose Luhn sum is
/// divisible by 10.
///
/// Counting from the rightmost digit (position 1), every even position is
/// doubled, with 9 subtracted when the doubled value exceeds 9.
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }

    let mut sum = 0u32;
    for (position, ch) in number.chars().rev().enumerate() {
        let Some(digit) = ch.to_digit(10) else {
            return false;
        };
        let value = if position % 2 == 1 {
            let doubled = digit * 2;
            if doubled > 9 {
                doubled - 9
            } else {
                doubled
            }
        } else {
            digit
        };
        sum += value;
    }

    sum % 10 == 0
}

/// Returns true when `number` consists only of ASCII digits.
pub fn is_digits(number: &str) -> bool {
    !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit())
}
