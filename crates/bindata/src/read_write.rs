//! `type.read(source)`/`type.write` style convenience entry points:
//! wraps the boilerplate of building a root [`Scope`] and a slice-backed
//! reader/writer around a single [`NodeRef`].

use bindata_core::{BitReader, BitWriter, SliceSource, VecSink};
use bindata_schema::{Scope, SchemaResult, NodeRef};

/// Reads `bytes` into `root` from the beginning, building the root [`Scope`]
/// for you.
pub fn read_from_slice(root: &NodeRef, bytes: &[u8]) -> SchemaResult<()> {
    let mut reader = BitReader::new(SliceSource::new(bytes));
    let scope = Scope::from_node(root.clone());
    root.borrow_mut().read(&mut reader, &scope)
}

/// Encodes `root`'s current contents into a fresh `Vec<u8>`.
pub fn write_to_vec(root: &NodeRef) -> SchemaResult<Vec<u8>> {
    let mut writer = BitWriter::new(VecSink::new());
    let scope = Scope::from_node(root.clone());
    root.borrow().write(&mut writer, &scope)?;
    writer.flush().map_err(|e| e.into_other_kind())?;
    Ok(writer.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindata_core::Endian;
    use bindata_schema::{finalize_tree, new_node_ref, Integer, StructBuilder};

    #[test]
    fn round_trips_a_small_struct_through_a_slice() {
        let a = new_node_ref(Integer::u8());
        let b = new_node_ref(Integer::u16(Endian::Big));
        let root = new_node_ref(StructBuilder::new().field("a", a).field("b", b).build());
        finalize_tree(&root);

        read_from_slice(&root, &[0x05, 0x00, 0x2A]).unwrap();
        let bytes = write_to_vec(&root).unwrap();
        assert_eq!(bytes, vec![0x05, 0x00, 0x2A]);
    }
}
