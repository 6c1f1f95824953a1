// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auto-generated document IDs in the same shape Firestore clients use.

use crate::error::AppError;
use ring::rand::{SecureRandom, SystemRandom};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 20;
// Largest multiple of the alphabet size that fits in a byte; bytes at or
// above it are rejected so every character is equally likely.
const REJECT_AT: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Generate a 20-character alphanumeric document ID.
pub fn new_document_id() -> Result<String, AppError> {
    let rng = SystemRandom::new();
    let mut id = String::with_capacity(ID_LEN);
    let mut buf = [0u8; 32];

    while id.len() < ID_LEN {
        rng.fill(&mut buf)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;

        for &b in buf.iter().filter(|&&b| b < REJECT_AT) {
            if id.len() == ID_LEN {
                break;
            }
            id.push(ALPHABET[b as usize % ALPHABET.len()] as char);
        }
    }

    Ok(id)
}
