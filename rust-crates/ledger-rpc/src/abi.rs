//! Contract ABI encoding for the vault's fixed function surface.
//!
//! Only what the vault uses is covered: static words, one `string` argument,
//! and the leaderboard's `(address[100], uint256[])` return shape.

use primitive_types::U256;
use sha3::{
    Digest,
    Keccak256,
};
use thiserror::Error;
use vault_sync::{
    Address,
    RemoteError,
    Token,
    WriteCall,
};

pub const WORD: usize = 32;
/// Fixed length of the address half of `getLeaderboard()`.
pub const LEADERBOARD_SLOTS: usize = 100;

pub const GET_USER_STATS: &str = "getUserStats(address)";
pub const GET_PROTOCOL_STATS: &str = "getProtocolStats()";
pub const GET_CURRENT_ROUND: &str = "getCurrentRound()";
pub const GET_LEADERBOARD: &str = "getLeaderboard()";

pub const USER_STATS_OUTPUTS: &[Kind] = &[Kind::Uint; 7];
pub const PROTOCOL_STATS_OUTPUTS: &[Kind] = &[Kind::Uint; 7];
pub const CURRENT_ROUND_OUTPUTS: &[Kind] = &[
    Kind::Uint,
    Kind::Uint,
    Kind::Uint,
    Kind::Uint,
    Kind::Uint,
    Kind::Bool,
];

type Word = [u8; WORD];

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AbiError {
    #[error("Invalid referrer address: {0}")]
    InvalidReferrer(String),
    #[error("Return data is not word aligned ({0} bytes)")]
    Unaligned(usize),
    #[error("Return data too short: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("Dynamic offset {0} is out of range")]
    BadOffset(U256),
    #[error("Word {index} is not a valid {kind}")]
    BadWord { index: usize, kind: &'static str },
}

impl From<AbiError> for RemoteError {
    fn from(err: AbiError) -> Self {
        RemoteError::new(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    Uint,
    Bool,
    Address,
}

pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

pub fn uint_word(value: U256) -> Word {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

pub fn address_word(address: &Address) -> Word {
    let mut word = [0u8; WORD];
    word[WORD - 20..].copy_from_slice(address.as_bytes());
    word
}

/// Selector followed by static argument words.
pub fn encode_call(signature: &str, args: &[Word]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

pub fn write_signature(call: &WriteCall) -> &'static str {
    match call {
        WriteCall::Deposit { .. } => "deposit(address)",
        WriteCall::Withdraw { .. } => "withdraw(uint256)",
        WriteCall::ClaimRewards => "claimRewards()",
        WriteCall::FinalizeLottery => "finalizeLottery()",
        WriteCall::CreateCircle { .. } => "createCircle(string,uint256,uint256,uint256)",
        WriteCall::JoinCircle { .. } => "joinCircle(uint256)",
        WriteCall::ContributeToCircle { .. } => "contributeToCircle(uint256)",
        WriteCall::WithdrawFromCircle { .. } => "withdrawFromCircle(uint256)",
    }
}

/// Calldata for a write. The attached native value travels separately.
pub fn encode_write(call: &WriteCall) -> Result<Vec<u8>, AbiError> {
    let signature = write_signature(call);
    let data = match call {
        WriteCall::Deposit { referrer, .. } => {
            let referrer: Address = referrer
                .trim()
                .parse()
                .map_err(|_| AbiError::InvalidReferrer(referrer.clone()))?;
            encode_call(signature, &[address_word(&referrer)])
        }
        WriteCall::Withdraw { amount } => encode_call(signature, &[uint_word(amount.raw())]),
        WriteCall::ClaimRewards | WriteCall::FinalizeLottery => encode_call(signature, &[]),
        WriteCall::CreateCircle {
            name,
            target_amount,
            duration_days,
            max_members,
        } => {
            let head = [
                uint_word(U256::from(4 * WORD)),
                uint_word(target_amount.raw()),
                uint_word(*duration_days),
                uint_word(*max_members),
            ];
            let mut data = encode_call(signature, &head);
            data.extend_from_slice(&encode_bytes_tail(name.as_bytes()));
            data
        }
        WriteCall::JoinCircle { circle_id }
        | WriteCall::ContributeToCircle { circle_id, .. }
        | WriteCall::WithdrawFromCircle { circle_id } => {
            encode_call(signature, &[uint_word(*circle_id)])
        }
    };
    Ok(data)
}

fn encode_bytes_tail(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut tail = Vec::with_capacity(WORD + padded);
    tail.extend_from_slice(&uint_word(U256::from(bytes.len())));
    tail.extend_from_slice(bytes);
    tail.resize(WORD + padded, 0);
    tail
}

fn words(data: &[u8]) -> Result<Vec<Word>, AbiError> {
    if data.len() % WORD != 0 {
        return Err(AbiError::Unaligned(data.len()));
    }
    Ok(data
        .chunks_exact(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

fn decode_word(word: &Word, kind: Kind, index: usize) -> Result<Token, AbiError> {
    let value = U256::from_big_endian(word);
    match kind {
        Kind::Uint => Ok(Token::Uint(value)),
        Kind::Bool if value.is_zero() => Ok(Token::Bool(false)),
        Kind::Bool if value == U256::one() => Ok(Token::Bool(true)),
        Kind::Bool => Err(AbiError::BadWord {
            index,
            kind: "bool",
        }),
        Kind::Address => {
            if word[..WORD - 20].iter().any(|b| *b != 0) {
                return Err(AbiError::BadWord {
                    index,
                    kind: "address",
                });
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&word[WORD - 20..]);
            Ok(Token::Address(Address::new(bytes)))
        }
    }
}

/// Decodes a tuple of static outputs. Missing trailing words are not an error
/// here; callers see a shorter token list and judge the arity themselves.
pub fn decode_outputs(data: &[u8], kinds: &[Kind]) -> Result<Vec<Token>, AbiError> {
    words(data)?
        .iter()
        .zip(kinds)
        .enumerate()
        .map(|(index, (word, kind))| decode_word(word, *kind, index))
        .collect()
}

fn word_to_usize(value: U256) -> Option<usize> {
    (value.bits() <= 32).then(|| value.low_u32() as usize)
}

/// Decodes `(address[100], uint256[])` into two [`Token::Array`]s.
pub fn decode_leaderboard(data: &[u8]) -> Result<Vec<Token>, AbiError> {
    let words = words(data)?;
    let head = LEADERBOARD_SLOTS + 1;
    if words.len() < head {
        return Err(AbiError::Truncated {
            needed: head * WORD,
            actual: data.len(),
        });
    }
    let addresses = words[..LEADERBOARD_SLOTS]
        .iter()
        .enumerate()
        .map(|(index, word)| decode_word(word, Kind::Address, index))
        .collect::<Result<Vec<_>, _>>()?;

    let raw_offset = U256::from_big_endian(&words[LEADERBOARD_SLOTS]);
    let offset = word_to_usize(raw_offset)
        .filter(|offset| offset % WORD == 0 && offset / WORD < words.len())
        .ok_or(AbiError::BadOffset(raw_offset))?;
    let start = offset / WORD;
    let raw_len = U256::from_big_endian(&words[start]);
    let len = word_to_usize(raw_len).ok_or(AbiError::BadOffset(raw_len))?;
    let end = start + 1 + len;
    if end > words.len() {
        return Err(AbiError::Truncated {
            needed: end * WORD,
            actual: data.len(),
        });
    }
    let amounts = words[start + 1..end]
        .iter()
        .map(|word| Token::Uint(U256::from_big_endian(word)))
        .collect();

    Ok(vec![Token::Array(addresses), Token::Array(amounts)])
}
