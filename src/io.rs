//! On-disk framing for generated datasets.
//!
//! A dataset file is the 8-byte little-endian [`DAG_MAGIC_NUM`] followed by
//! the raw dataset, elements in index order.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ethereum_types::H256;

use crate::dag::alloc_zeroed;
use crate::{Error, DAG_MAGIC_NUM, MIX_BYTES, REVISION};

/// Conventional file name for the dataset of the epoch with `seed`.
pub fn dag_file_name(seed: &H256) -> String {
    format!("full-R{}-{}", REVISION, hex::encode(&seed.as_bytes()[..8]))
}

pub fn write_dag<W: Write>(mut writer: W, dataset: &[u8]) -> Result<(), Error> {
    writer.write_u64::<LittleEndian>(DAG_MAGIC_NUM)?;
    writer.write_all(dataset)?;
    writer.flush()?;
    Ok(())
}

/// Read a framed dataset of exactly `full_size` bytes.
pub fn read_dag<R: Read>(mut reader: R, full_size: usize) -> Result<Vec<u8>, Error> {
    if full_size == 0 || full_size % MIX_BYTES != 0 {
        return Err(Error::InvalidDatasetSize(full_size));
    }
    let magic = reader.read_u64::<LittleEndian>()?;
    if magic != DAG_MAGIC_NUM {
        return Err(Error::BadMagic(magic));
    }
    let mut dataset = alloc_zeroed(full_size)?;
    reader.read_exact(&mut dataset)?;
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DAG_MAGIC_NUM_SIZE;

    #[test]
    fn file_name_uses_seed_prefix() {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02, 0x03]);
        seed[8] = 0xff;
        assert_eq!(dag_file_name(&H256(seed)), "full-R23-deadbeef00010203");
    }

    #[test]
    fn framing() {
        let dataset: Vec<u8> = (0..2 * MIX_BYTES).map(|i| i as u8).collect();
        let mut file = Vec::new();
        write_dag(&mut file, &dataset).unwrap();
        assert_eq!(file.len(), DAG_MAGIC_NUM_SIZE + dataset.len());
        assert_eq!(&file[..8], &[0xfe, 0xca, 0xdd, 0xba, 0xad, 0xde, 0xe1, 0xfe]);
        assert_eq!(read_dag(&file[..], dataset.len()).unwrap(), dataset);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut file = vec![0u8; DAG_MAGIC_NUM_SIZE + MIX_BYTES];
        file[0] = 1;
        assert!(matches!(read_dag(&file[..], MIX_BYTES), Err(Error::BadMagic(1))));
    }

    #[test]
    fn rejects_short_file() {
        let mut file = Vec::new();
        write_dag(&mut file, &[7u8; MIX_BYTES]).unwrap();
        assert!(matches!(read_dag(&file[..], 2 * MIX_BYTES), Err(Error::Io(_))));
    }
}
