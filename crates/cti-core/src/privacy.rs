//! Phone number masking for serialized projections

use serde::Deserialize;

/// How phone numbers are obfuscated when a caller asks for a masked view.
///
/// Calls that went through a queue use their own truncation length, so that
/// queue agents can still recognise returning customers.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Privacy {
    /// Replacement for the truncated tail
    #[serde(default = "default_mask")]
    pub mask: String,

    /// Trailing digits hidden on regular calls
    #[serde(default = "default_trunc")]
    pub trunc_digits: usize,

    /// Trailing digits hidden on calls through a queue
    #[serde(default = "default_queue_trunc")]
    pub queue_trunc_digits: usize,
}

fn default_mask() -> String {
    "xxx".to_string()
}

fn default_trunc() -> usize {
    3
}

fn default_queue_trunc() -> usize {
    2
}

impl Default for Privacy {
    fn default() -> Self {
        Self {
            mask: default_mask(),
            trunc_digits: default_trunc(),
            queue_trunc_digits: default_queue_trunc(),
        }
    }
}

impl Privacy {
    /// Mask a number. Numbers not longer than the truncation length are
    /// replaced entirely by the mask.
    pub fn mask_number(&self, number: &str, through_queue: bool) -> String {
        if number.is_empty() {
            return String::new();
        }
        let digits = if through_queue {
            self.queue_trunc_digits
        } else {
            self.trunc_digits
        };
        let chars: Vec<char> = number.chars().collect();
        if chars.len() <= digits {
            return self.mask.clone();
        }
        let kept: String = chars[..chars.len() - digits].iter().collect();
        format!("{}{}", kept, self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_regular_call() {
        let privacy = Privacy::default();
        assert_eq!(privacy.mask_number("0721123456", false), "0721123xxx");
    }

    #[test]
    fn test_mask_queue_call() {
        let privacy = Privacy::default();
        assert_eq!(privacy.mask_number("0721123456", true), "07211234xxx");
    }

    #[test]
    fn test_mask_short_and_empty() {
        let privacy = Privacy::default();
        assert_eq!(privacy.mask_number("12", false), "xxx");
        assert_eq!(privacy.mask_number("", true), "");
    }
}
