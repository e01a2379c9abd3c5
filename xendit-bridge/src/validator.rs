//! Card validity checks.
//!
//! The orchestrator only depends on the [`CardValidator`] trait. Hosts with
//! their own validation rules can plug them in; [`StandardCardValidator`]
//! covers Luhn, expiry, CVN format, and brand-specific CVN length.

use chrono::{Datelike, NaiveDate, Utc};

/// Card brand as understood by the card tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardType {
    /// Visa.
    Visa,
    /// Mastercard.
    Mastercard,
    /// American Express.
    Amex,
    /// Discover.
    Discover,
    /// Diners Club.
    DinersClub,
    /// JCB.
    Jcb,
}

impl CardType {
    /// Brand key expected by the tokenizer's `cardType` field.
    #[must_use]
    pub const fn card_type_key(self) -> &'static str {
        match self {
            Self::Visa => "001",
            Self::Mastercard => "002",
            Self::Amex => "003",
            Self::Discover => "004",
            Self::DinersClub => "005",
            Self::Jcb => "007",
        }
    }

    /// Number of CVN digits printed on cards of this brand.
    #[must_use]
    pub const fn cvn_length(self) -> usize {
        match self {
            Self::Amex => 4,
            _ => 3,
        }
    }
}

/// Pure card validation capability.
///
/// Implementations must be free of side effects; the orchestrator calls them
/// in a fixed order (number, expiry, CVN format, CVN for brand) and stops at
/// the first failure.
pub trait CardValidator: Send + Sync {
    /// Returns `true` if the number is well formed and passes the Luhn check.
    fn is_card_number_valid(&self, number: &str) -> bool;

    /// Returns `true` if the expiry is a real month that has not passed.
    fn is_expiry_valid(&self, month: &str, year: &str) -> bool;

    /// Returns `true` if the CVN is 3 or 4 digits.
    fn is_cvn_valid(&self, cvn: &str) -> bool;

    /// Returns `true` if the CVN length matches the brand of `number`.
    fn is_cvn_valid_for_card_type(&self, cvn: &str, number: &str) -> bool;

    /// Classifies the brand of `number`, or `None` when it is not recognized.
    fn card_type(&self, number: &str) -> Option<CardType>;
}

/// Default validator.
///
/// # Examples
///
/// ```
/// use xendit_bridge::validator::{CardType, CardValidator, StandardCardValidator};
///
/// let validator = StandardCardValidator::new();
/// assert!(validator.is_card_number_valid("4111111111111111"));
/// assert!(!validator.is_card_number_valid("4111111111111112"));
/// assert_eq!(validator.card_type("378282246310005"), Some(CardType::Amex));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCardValidator {
    today: Option<NaiveDate>,
}

impl StandardCardValidator {
    /// Creates a validator that checks expiry against the current UTC date.
    #[must_use]
    pub const fn new() -> Self {
        Self { today: None }
    }

    /// Creates a validator with a fixed reference date for expiry checks.
    #[must_use]
    pub const fn with_today(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl CardValidator for StandardCardValidator {
    fn is_card_number_valid(&self, number: &str) -> bool {
        let digits = clean_number(number);
        (12..=19).contains(&digits.len())
            && digits.bytes().all(|b| b.is_ascii_digit())
            && luhn::valid(&digits)
    }

    fn is_expiry_valid(&self, month: &str, year: &str) -> bool {
        let (Ok(month), Ok(year)) = (month.trim().parse::<u32>(), year.trim().parse::<i32>())
        else {
            return false;
        };
        if !(1..=12).contains(&month) {
            return false;
        }
        let year = match year {
            0..=99 => 2000 + year,
            1900..=2199 => year,
            _ => return false,
        };

        let today = self.today();
        (year, month) >= (today.year(), today.month())
    }

    fn is_cvn_valid(&self, cvn: &str) -> bool {
        (3..=4).contains(&cvn.len()) && cvn.bytes().all(|b| b.is_ascii_digit())
    }

    fn is_cvn_valid_for_card_type(&self, cvn: &str, number: &str) -> bool {
        match self.card_type(number) {
            Some(card_type) => cvn.len() == card_type.cvn_length(),
            None => self.is_cvn_valid(cvn),
        }
    }

    fn card_type(&self, number: &str) -> Option<CardType> {
        let digits = clean_number(number);
        let prefix = |len: usize| digits.get(..len).and_then(|p| p.parse::<u32>().ok());

        if digits.starts_with('4') {
            return Some(CardType::Visa);
        }
        if matches!(prefix(2), Some(34 | 37)) {
            return Some(CardType::Amex);
        }
        if matches!(prefix(2), Some(51..=55)) || matches!(prefix(4), Some(2221..=2720)) {
            return Some(CardType::Mastercard);
        }
        if matches!(prefix(4), Some(6011)) || matches!(prefix(2), Some(65)) {
            return Some(CardType::Discover);
        }
        if matches!(prefix(2), Some(36 | 38)) || matches!(prefix(3), Some(300..=305)) {
            return Some(CardType::DinersClub);
        }
        if matches!(prefix(4), Some(3528..=3589)) {
            return Some(CardType::Jcb);
        }
        None
    }
}

fn clean_number(number: &str) -> String {
    number.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn validator() -> StandardCardValidator {
        StandardCardValidator::with_today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    #[test]
    fn test_known_test_numbers_are_valid() {
        let v = validator();
        for number in [
            "4111111111111111",
            "5555555555554444",
            "378282246310005",
            "6011111111111117",
            "3530111333300000",
            "4111 1111 1111 1111",
        ] {
            assert!(v.is_card_number_valid(number), "{number} should be valid");
        }
    }

    #[test]
    fn test_invalid_numbers() {
        let v = validator();
        assert!(!v.is_card_number_valid("4111111111111112"));
        assert!(!v.is_card_number_valid("41111111111a1111"));
        assert!(!v.is_card_number_valid("42"));
        assert!(!v.is_card_number_valid(""));
    }

    #[test]
    fn test_expiry() {
        let v = validator();
        assert!(v.is_expiry_valid("12", "2030"));
        assert!(v.is_expiry_valid("10", "2026"));
        assert!(v.is_expiry_valid("11", "26"));
        assert!(!v.is_expiry_valid("09", "2026"));
        assert!(!v.is_expiry_valid("13", "2030"));
        assert!(!v.is_expiry_valid("00", "2030"));
        assert!(!v.is_expiry_valid("ab", "2030"));
        assert!(!v.is_expiry_valid("12", "20300"));
    }

    #[test]
    fn test_cvn_format() {
        let v = validator();
        assert!(v.is_cvn_valid("123"));
        assert!(v.is_cvn_valid("1234"));
        assert!(!v.is_cvn_valid("12"));
        assert!(!v.is_cvn_valid("12a"));
    }

    #[test]
    fn test_cvn_for_brand() {
        let v = validator();
        assert!(v.is_cvn_valid_for_card_type("123", "4111111111111111"));
        assert!(!v.is_cvn_valid_for_card_type("1234", "4111111111111111"));
        assert!(v.is_cvn_valid_for_card_type("1234", "378282246310005"));
        assert!(!v.is_cvn_valid_for_card_type("123", "378282246310005"));
    }

    #[test]
    fn test_card_type_keys() {
        let v = validator();
        assert_eq!(v.card_type("4111111111111111").map(CardType::card_type_key), Some("001"));
        assert_eq!(v.card_type("2221000000000009"), Some(CardType::Mastercard));
        assert_eq!(v.card_type("30569309025904"), Some(CardType::DinersClub));
        assert_eq!(v.card_type("9000000000000000"), None);
    }

    proptest! {
        #[test]
        fn test_single_digit_change_breaks_luhn(position in 0usize..16, delta in 1u8..10) {
            let valid = b"4111111111111111";
            let mut mutated = valid.to_vec();
            let digit = mutated[position] - b'0';
            mutated[position] = b'0' + (digit + delta) % 10;
            let number = String::from_utf8(mutated).unwrap();
            prop_assert!(!validator().is_card_number_valid(&number));
        }
    }
}
