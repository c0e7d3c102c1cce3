use bitcoin::Transaction;

/// Debug printer for byte slices, as lowercase hex.
pub struct DebugBytes<'a>(pub &'a [u8]);
impl<'a> core::fmt::Debug for DebugBytes<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        for i in self.0 {
            write!(f, "{:02x}", i)?;
        }
        Ok(())
    }
}

/// Debug printer for secret material.  Never prints the value, only whether it is set.
pub struct DebugSecret<'a>(pub &'a [u8]);
impl<'a> core::fmt::Debug for DebugSecret<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        write!(f, "<{} byte secret>", self.0.len())
    }
}

/// Debug printer for an escape transaction which shows the txid and the spent outpoint
/// instead of the full structure.
pub struct DebugEscapeTx<'a>(pub &'a Transaction);
impl<'a> core::fmt::Debug for DebugEscapeTx<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        f.debug_struct("EscapeTx")
            .field("txid", &self.0.compute_txid())
            .field("inputs", &self.0.input.iter().map(|i| i.previous_output).collect::<Vec<_>>())
            .field(
                "outputs",
                &self.0.output.iter().map(|o| o.value.to_sat()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_bytes_test() {
        assert_eq!(format!("{:?}", DebugBytes(&[0x01, 0xab])), "01ab");
        assert_eq!(format!("{:?}", DebugSecret(&[7u8; 32])), "<32 byte secret>");
    }
}
