use anyhow::{bail, Result};
use gk_audit::VerifyResult;

pub fn run(path: String) -> Result<()> {
    match gk_audit::verify_hash_chain(&path)? {
        VerifyResult::Valid { lines } => {
            println!("chain_valid=true lines={lines}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("chain_valid=false broken_at_line={line} reason={reason}");
            bail!("audit log {path} hash chain broken at line {line}: {reason}");
        }
    }
}
