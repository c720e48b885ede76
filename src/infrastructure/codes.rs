use rand::Rng;

use crate::domain::ports::CodeGenerator;
use crate::domain::transaction::{CODE_ALPHABET, CODE_LEN, TransactionCode};

/// Samples codes uniformly from the 36-symbol alphabet.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> TransactionCode {
        let mut rng = rand::thread_rng();
        let raw: String = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        TransactionCode::new_unchecked(raw)
    }
}
