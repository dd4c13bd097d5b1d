// Batch detection for piece identifiers

// Separator between piece codes in a batch identifier
pub const PIECE_DELIMITER: char = ';';

// Maximum number of pieces queried at the same time
pub const MAX_PIECE_CNT: usize = 20;

// Number of delimiter-separated segments, empty ones included
pub fn piece_count(piece_code: &str) -> usize {
    piece_code.split(PIECE_DELIMITER).count()
}

// Returns true when `piece_code` lists several pieces within the ceiling.
//
// An identifier with more than `MAX_PIECE_CNT` pieces is not a batch: it
// falls through to single-piece handling instead of being rejected.
pub fn is_batch(piece_code: &str) -> bool {
    piece_code.contains(PIECE_DELIMITER) && piece_count(piece_code) <= MAX_PIECE_CNT
}
