use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use splitkit_io_xlsx::EnumCellValue;

use crate::conf::{
    C_FILE_STEM_BLANK, C_OUTPUT_FILE_EXT, N_LEN_FILE_STEM_MAX, TUP_FILE_STEM_RESERVED,
};

static RE_FILE_STEM_ILLEGAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1F\x7F]"#).expect("Invalid file stem pattern")
});

/// Filesystem-safe file stem for one value.
///
/// Illegal and control chars become `_`; surrounding whitespace, leading
/// dots and trailing dots are removed; Windows device names get a `_`
/// prefix; the stem is capped at [`N_LEN_FILE_STEM_MAX`] UTF-8 bytes on a
/// char boundary.
pub fn derive_file_stem(value: &EnumCellValue) -> String {
    let c_text = value.display_text();
    let c_replaced = RE_FILE_STEM_ILLEGAL.replace_all(&c_text, "_");
    let c_trimmed = c_replaced
        .trim()
        .trim_start_matches('.')
        .trim_end_matches(['.', ' '])
        .trim();
    let mut c_stem = truncate_to_byte_len(c_trimmed, N_LEN_FILE_STEM_MAX)
        .trim_end_matches(['.', ' '])
        .to_string();

    if c_stem.is_empty() {
        return C_FILE_STEM_BLANK.to_string();
    }
    let c_base = c_stem.split('.').next().unwrap_or_default();
    if TUP_FILE_STEM_RESERVED
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(c_base))
    {
        c_stem.insert(0, '_');
    }
    c_stem
}

fn truncate_to_byte_len(text: &str, n_bytes_max: usize) -> &str {
    if text.len() <= n_bytes_max {
        return text;
    }
    let mut n_end = n_bytes_max;
    while !text.is_char_boundary(n_end) {
        n_end -= 1;
    }
    &text[..n_end]
}

/// Unique output file names for `values`, in input order.
///
/// Stems that collide (exactly or case-insensitively) get `__2`, `__3`...
/// suffixes, so the first value in order keeps the bare name.
pub fn derive_output_file_names(values: &[EnumCellValue]) -> Vec<String> {
    let mut set_taken: HashSet<String> = HashSet::with_capacity(values.len());
    let mut l_names = Vec::with_capacity(values.len());
    for value in values {
        let c_stem = derive_file_stem(value);
        let mut c_name = format!("{c_stem}.{C_OUTPUT_FILE_EXT}");
        let mut n_suffix = 2usize;
        while !set_taken.insert(c_name.to_lowercase()) {
            c_name = format!("{c_stem}__{n_suffix}.{C_OUTPUT_FILE_EXT}");
            n_suffix += 1;
        }
        l_names.push(c_name);
    }
    l_names
}
