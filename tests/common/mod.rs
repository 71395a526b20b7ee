//! Hash set fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";
pub const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
pub const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";
pub const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
pub const A_MD5: &str = "0cc175b9c0f1b6a831c399e269772661";
pub const MISSING_MD5: &str = "ffffffffffffffffffffffffffffffff";

pub const NSRL_V2_HEADER: &str =
    r#""SHA-1","MD5","CRC32","FileName","FileSize","ProductCode","OpSystemCode","SpecialCode""#;

pub const HASHKEEPER_HEADER: &str = r#""file_id","hashset_id","file_name","directory","hash","file_size","date_modified","time_modified","time_zone","comments","date_accessed","time_accessed""#;

pub fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// NSRL listing with the empty-file hash under two names and "abc" once.
pub fn nsrl_listing() -> String {
    format!(
        "{header}\r\n\
         \"{empty_sha1}\",\"{empty_md5}\",\"00000000\",\"empty.txt\",\"0\",\"1\",\"WIN\",\"\"\r\n\
         \"{abc_sha1}\",\"{abc_md5}\",\"352441C2\",\"abc.txt\",\"3\",\"1\",\"WIN\",\"\"\r\n\
         \"{empty_sha1}\",\"{empty_md5}\",\"00000000\",\"zero, length.dat\",\"0\",\"2\",\"LIN\",\"\"\r\n",
        header = NSRL_V2_HEADER,
        empty_sha1 = EMPTY_SHA1.to_uppercase(),
        empty_md5 = EMPTY_MD5.to_uppercase(),
        abc_sha1 = ABC_SHA1.to_uppercase(),
        abc_md5 = ABC_MD5.to_uppercase(),
    )
}

/// GNU and BSD md5sum lines, with the empty-file hash listed twice.
pub fn md5sum_listing() -> String {
    format!(
        "{empty}  empty.txt\n\
         {abc} *abc.bin\n\
         MD5 (copy of empty.txt) = {empty}\n",
        empty = EMPTY_MD5,
        abc = ABC_MD5,
    )
}

pub fn hashkeeper_listing() -> String {
    format!(
        "{header}\n\
         1,7,\"empty.txt\",\"C:\\data\\\",\"{empty}\",0,\"01/01/2004\",\"00:00:00\",,\"known good\",,\n\
         2,7,\"abc.txt\",\"C:\\data\\\",\"{abc}\",3,\"01/01/2004\",\"00:00:00\",,,,\n",
        header = HASHKEEPER_HEADER,
        empty = EMPTY_MD5.to_uppercase(),
        abc = ABC_MD5.to_uppercase(),
    )
}

/// EnCase hash set named `set_name` holding `md5s`.
pub fn encase_set(set_name: &str, md5s: &[&str]) -> Vec<u8> {
    let mut data = b"HASH\r\n\xff\x00".to_vec();
    data.resize(1032, 0);
    let mut name: Vec<u8> = set_name.encode_utf16().flat_map(u16::to_le_bytes).collect();
    name.resize(80, 0);
    data.extend_from_slice(&name);
    data.resize(1152, 0);
    for md5 in md5s {
        data.extend_from_slice(&hex::decode(md5).unwrap());
        data.extend_from_slice(&[0, 0]);
    }
    data
}
