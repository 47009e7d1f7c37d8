use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    // VND 没有小数单位，USD 以美分存储
    pub amount: i64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    VND,
    USD,
}

impl Money {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn vnd(amount: i64) -> Self {
        Self { amount, currency: Currency::VND }
    }

    pub fn usd(cents: i64) -> Self {
        Self { amount: cents, currency: Currency::USD }
    }

    pub fn add(&self, other: &Self) -> Result<Self, &'static str> {
        if self.currency != other.currency {
            return Err("Cannot add different currencies");
        }

        Ok(Self {
            amount: self.amount.saturating_add(other.amount),
            currency: self.currency,
        })
    }

    pub fn times(&self, quantity: i32) -> Self {
        Self {
            amount: self.amount.saturating_mul(i64::from(quantity)),
            currency: self.currency,
        }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        match self.currency {
            Currency::VND => write!(f, "{}{} ₫", sign, group_thousands(self.amount.unsigned_abs())),
            Currency::USD => write!(f, "{}${:.2}", sign, self.amount.unsigned_abs() as f64 / 100.0),
        }
    }
}
