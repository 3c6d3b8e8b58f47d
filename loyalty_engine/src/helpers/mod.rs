//! Small utilities shared across the engine.

/// Returns true if `number` passes the Luhn checksum.
///
/// The rightmost digit is the check digit; every second digit of the payload is doubled (with digits above 9 reduced
/// by summing their digits) and the total must be divisible by 10.
pub fn luhn_checksum_is_valid(number: i64) -> bool {
    if number <= 0 {
        return false;
    }
    (number % 10 + luhn_checksum(number / 10)) % 10 == 0
}

fn luhn_checksum(mut payload: i64) -> i64 {
    let mut sum = 0;
    let mut position = 0;
    while payload > 0 {
        let mut digit = payload % 10;
        if position % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit = digit % 10 + digit / 10;
            }
        }
        sum += digit;
        payload /= 10;
        position += 1;
    }
    sum % 10
}

#[cfg(test)]
mod test {
    use super::luhn_checksum_is_valid;

    #[test]
    fn accepts_valid_numbers() {
        // standard card-style test numbers
        assert!(luhn_checksum_is_valid(1234567812345670));
        assert!(luhn_checksum_is_valid(79927398713));
        assert!(luhn_checksum_is_valid(4539148803436467));
    }

    #[test]
    fn rejects_invalid_numbers() {
        assert!(!luhn_checksum_is_valid(1234567812345671));
        assert!(!luhn_checksum_is_valid(79927398710));
        assert!(!luhn_checksum_is_valid(0));
        assert!(!luhn_checksum_is_valid(-79927398713));
    }
}
