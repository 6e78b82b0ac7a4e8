//! Hamming weight leakage model of the AES first round S-box output.
pub mod aes;

/// Highest Hamming weight a byte can have.
pub const MAX_HW: u8 = 8;

/// Hamming weight of every byte value.
pub static HW: [u8; 256] = hw_table();

const fn hw_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).count_ones() as u8;
        i += 1;
    }
    table
}

/// Return the Hamming weight of `value`.
pub fn hw(value: u8) -> u8 {
    HW[value as usize]
}

/// Predicted intermediate value: the S-box output of the plaintext byte mixed with the key guess.
pub fn intermediate(plaintext_byte: u8, guess: u8) -> u8 {
    aes::sbox(plaintext_byte ^ guess)
}

/// Leakage predicted for a plaintext byte under a key guess, as used by the CPA hypothesis.
pub fn hw_leakage(plaintext_byte: u8, guess: u8) -> f64 {
    f64::from(hw(intermediate(plaintext_byte, guess)))
}
