use rand::Rng;

use super::JoinCode;

/// Fixed-width numeric join codes
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    low: JoinCode,
    high: JoinCode,
}

impl CodeGenerator {
    /// `digits` is expected in 1..=9 so every code fits a `u32`
    pub fn new(digits: u32) -> Self {
        let digits = digits.clamp(1, 9);
        let low = if digits == 1 { 0 } else { 10u32.pow(digits - 1) };
        let high = 10u32.pow(digits) - 1;
        Self { low, high }
    }

    pub fn generate(&self) -> JoinCode {
        rand::thread_rng().gen_range(self.low..=self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_digit_codes() {
        let generator = CodeGenerator::new(6);
        for _ in 0..1000 {
            let code = generator.generate();
            assert_eq!(code.to_string().len(), 6);
        }
    }

    #[test]
    fn test_width_is_clamped() {
        let generator = CodeGenerator::new(12);
        assert_eq!(generator.high, 999_999_999);
        assert_eq!(generator.low, 100_000_000);
    }
}
