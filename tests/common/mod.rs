use binpatch::Patch;

/// Replay a patch chain over an in-memory document. Each patch's offsets
/// are interpreted against the output of the previous one, mirroring how a
/// history's entries chain together.
pub fn replay(doc: &[u8], patches: &[Patch]) -> Vec<u8> {
    let mut out = doc.to_vec();
    for patch in patches {
        let start = patch.start_offset() as usize;
        let end = patch.end_offset() as usize;
        out.splice(start..end, patch.data());
    }
    out
}
