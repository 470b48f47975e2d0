//! Wire protocol: fixed-width frames and the admission request codec
//! (component C2).
//!
//! ```text
//! <player_name>\n
//! <item_1>\t<quantity_1>\n
//! <item_2>\t<quantity_2>\n
//! ...
//! ```
//!
//! The request is carried in a 1024-byte, zero-padded frame. Parsing stops
//! at the first empty line or the end of the buffer. The reply is a single
//! 32-byte frame: `"OK\n"` (null-padded) on success, anything else is a
//! rejection and the connection is closed.

use crate::inventory::{Inventory, MAX_QUANTITY, MAX_TOKEN_LEN};
use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Size of the admission-request and chat frames.
pub const REQUEST_FRAME_LEN: usize = 1024;
/// Size of the admission-reply frame.
pub const REPLY_FRAME_LEN: usize = 32;
/// Size of in-room chat and lifecycle (`START`, waiting keep-alive) frames.
pub const CHAT_FRAME_LEN: usize = 1024;

const OK_TEXT: &str = "OK\n";
const REJECT_TEXT: &str = "Encountered a problem";
const START_TEXT: &str = "START\n";
const WAITING_TEXT: &str = "Waiting for more players ...\n";

/// Why an admission request frame could not be parsed (§4.2, §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty request")]
    Empty,
    #[error("player name missing or invalid")]
    InvalidName,
    #[error("malformed item row: {0:?}")]
    MalformedRow(String),
    #[error("quantity out of range in row: {0:?}")]
    QuantityOutOfRange(String),
    #[error("duplicate item in request: {0}")]
    DuplicateItem(String),
}

/// A parsed admission request: a player name plus the inventory they want
/// to claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub player_name: String,
    pub inventory: Inventory,
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token.bytes().all(|b| !b.is_ascii_whitespace())
}

/// Parses one `item\tquantity` row. Shared by the request codec and the
/// inventory-file loader (§6), which use the same record format.
pub fn parse_item_row(row: &str) -> Result<(String, u32), CodecError> {
    let mut fields = row.split('\t');
    let item = fields.next().ok_or_else(|| CodecError::MalformedRow(row.to_string()))?;
    let quantity = fields.next().ok_or_else(|| CodecError::MalformedRow(row.to_string()))?;
    if fields.next().is_some() || !is_valid_token(item) {
        return Err(CodecError::MalformedRow(row.to_string()));
    }
    let quantity: u32 = quantity
        .parse()
        .map_err(|_| CodecError::QuantityOutOfRange(row.to_string()))?;
    if quantity > MAX_QUANTITY {
        return Err(CodecError::QuantityOutOfRange(row.to_string()));
    }
    Ok((item.to_string(), quantity))
}

/// Parses a sequence of `item\tquantity` lines into an [`Inventory`],
/// rejecting malformed rows and duplicate items.
pub fn parse_item_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<Inventory, CodecError> {
    let mut inventory = Inventory::new();
    for line in lines {
        let (item, quantity) = parse_item_row(line)?;
        inventory
            .push(item.clone(), quantity)
            .map_err(|_| CodecError::DuplicateItem(item))?;
    }
    Ok(inventory)
}

/// Strips the zero padding from a fixed-width frame, returning the text
/// before the first NUL byte.
fn active_region(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}

/// Parses a request frame per §4.2: the player name on the first line,
/// then one `item\tquantity` row per line, stopping at the first empty
/// line or the end of the buffer.
pub fn parse_request(buf: &[u8]) -> Result<AdmissionRequest, CodecError> {
    let text = std::str::from_utf8(active_region(buf)).map_err(|_| CodecError::Empty)?;
    let mut lines = text.split('\n');
    let player_name = lines.next().ok_or(CodecError::Empty)?;
    if !is_valid_token(player_name) {
        return Err(CodecError::InvalidName);
    }

    let item_lines = lines.take_while(|line| !line.is_empty());
    let inventory = parse_item_lines(item_lines)?;

    Ok(AdmissionRequest {
        player_name: player_name.to_string(),
        inventory,
    })
}

/// Serializes a request back into its wire form, zero-padded to
/// [`REQUEST_FRAME_LEN`]. Inverse of [`parse_request`]: `parse_request(&
/// serialize_request(x)?) == Ok(x)` for any `x` that satisfies the
/// invariants of §3.
pub fn serialize_request(req: &AdmissionRequest) -> Result<[u8; REQUEST_FRAME_LEN], CodecError> {
    let mut text = String::new();
    text.push_str(&req.player_name);
    text.push('\n');
    for (item, qty) in req.inventory.iter() {
        text.push_str(item);
        text.push('\t');
        text.push_str(&qty.to_string());
        text.push('\n');
    }

    if text.len() > REQUEST_FRAME_LEN {
        return Err(CodecError::MalformedRow(
            "serialized request exceeds frame size".to_string(),
        ));
    }

    let mut frame = [0u8; REQUEST_FRAME_LEN];
    frame[..text.len()].copy_from_slice(text.as_bytes());
    Ok(frame)
}

fn pad_to(text: &str, len: usize) -> Bytes {
    let mut buf = BytesMut::zeroed(len);
    let n = text.len().min(len);
    buf[..n].copy_from_slice(&text.as_bytes()[..n]);
    buf.freeze()
}

/// The `"OK\n"` admission reply, null-padded to [`REPLY_FRAME_LEN`].
pub fn ok_reply() -> [u8; REPLY_FRAME_LEN] {
    let mut frame = [0u8; REPLY_FRAME_LEN];
    frame[..OK_TEXT.len()].copy_from_slice(OK_TEXT.as_bytes());
    frame
}

/// The generic rejection reply. The wire form does not distinguish which
/// [`crate::inventory::RejectReason`] or [`CodecError`] caused it; that
/// detail is only observable server-side via logging.
pub fn reject_reply() -> [u8; REPLY_FRAME_LEN] {
    let mut frame = [0u8; REPLY_FRAME_LEN];
    let n = REJECT_TEXT.len().min(REPLY_FRAME_LEN);
    frame[..n].copy_from_slice(&REJECT_TEXT.as_bytes()[..n]);
    frame
}

/// Whether a reply frame the client received indicates success.
pub fn is_ok_reply(buf: &[u8]) -> bool {
    active_region(buf) == OK_TEXT.trim_end_matches('\n').as_bytes()
        || active_region(buf) == OK_TEXT.as_bytes()
}

/// The `"START\n"` frame broadcast once to every member when a room seals.
pub fn start_frame() -> Bytes {
    pad_to(START_TEXT, CHAT_FRAME_LEN)
}

/// The periodic `"Waiting for more players ..."` keep-alive frame (§4.5).
pub fn waiting_frame() -> Bytes {
    pad_to(WAITING_TEXT, CHAT_FRAME_LEN)
}

/// Pads a client's own outgoing chat line for the wire. Unlike
/// [`chat_frame`], this carries no sender prefix; the relay adds that on
/// the way back out to every other member.
pub fn outgoing_message(text: &str) -> Bytes {
    pad_to(text, CHAT_FRAME_LEN)
}

/// Builds the relayed `"[<name>]: <raw_message>"` frame for a chat message,
/// truncating the combined text to fit the frame if necessary.
pub fn chat_frame(sender_name: &str, raw_message: &str) -> Bytes {
    let text = format!("[{sender_name}]: {raw_message}");
    pad_to(&text, CHAT_FRAME_LEN)
}

/// Extracts the active (non-padding) text from a chat frame as UTF-8,
/// replacing invalid sequences.
pub fn extract_text(buf: &[u8]) -> String {
    String::from_utf8_lossy(active_region(buf)).into_owned()
}
