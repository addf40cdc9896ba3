#![no_main]

use libfuzzer_sys::fuzz_target;
use metallib_archive::{Archive, DecodeOptions};

/// Max fuzz input size to keep per-iteration hashing cost bounded.
const MAX_INPUT_SIZE_BYTES: usize = 1024 * 1024; // 1 MiB

/// The function count is read before any entry is validated; skip absurd
/// counts so a valid-looking header can't stall an iteration.
const MAX_FUNCTIONS: u32 = 4096;

fuzz_target!(|data: &[u8]| {
    if data.len() > MAX_INPUT_SIZE_BYTES {
        return;
    }

    if data.len() >= 32 && &data[..4] == b"MTLB" {
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&data[24..32]);
        let offset = u64::from_le_bytes(offset);
        if let Some(count) = usize::try_from(offset)
            .ok()
            .and_then(|at| data.get(at..at.checked_add(4)?))
        {
            if u32::from_le_bytes([count[0], count[1], count[2], count[3]]) > MAX_FUNCTIONS {
                return;
            }
        }
    }

    // All errors are acceptable; panics are not.
    let Ok(archive) = Archive::decode(data) else {
        return;
    };

    for function in archive.functions() {
        let _ = (function.name.len(), function.bitcode.len(), function.function_type);
    }
    let _ = archive.bitcode_index().unique_count();

    // Skipping metadata must not change what else decodes.
    let lean = Archive::decode_with_options(data, &DecodeOptions::default().metadata_tags(false));
    assert!(lean.is_ok());
});
