#![no_main]

use dexscope::{DexFile, LoaderConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = DexFile::decode_with_config(data, LoaderConfig::strict());
});
