use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Subcommand;

use crate::{FragmentKind, ServerVersion, TableFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand, Default)]
pub enum Command {
    /// Print every recovered account as `account:hash`
    #[default]
    Users,
    /// Summarise the file's fragments and logical rows
    Info,
    /// List every physical fragment in file order
    Fragments,
}

pub fn execute_command(
    table_path: &Path,
    version: ServerVersion,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    let table = TableFile::open(table_path)?;
    run_command(&table, version, command, out)
}

pub fn run_command(
    table: &TableFile,
    version: ServerVersion,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Users => handle_users(table, version, out),
        Command::Info => handle_info(table, out),
        Command::Fragments => handle_fragments(table, out),
    }
}

fn handle_users(table: &TableFile, version: ServerVersion, out: &mut impl Write) -> Result<()> {
    let report = table.read_credentials(version);
    for (account, hash) in &report.credentials {
        writeln!(out, "{}:{}", account, hash)?;
    }
    Ok(())
}

fn handle_info(table: &TableFile, out: &mut impl Write) -> Result<()> {
    let mut per_type: BTreeMap<u8, usize> = BTreeMap::new();
    let mut fragments = 0;
    let mut rows = 0;
    let mut deleted = 0;

    for fragment in table.fragments() {
        fragments += 1;
        *per_type.entry(fragment.descriptor.rec_type).or_default() += 1;
        match fragment.kind {
            FragmentKind::RowStart => rows += 1,
            FragmentKind::Deleted => deleted += 1,
            FragmentKind::Tail => {}
        }
    }

    writeln!(out, "file size: {}", table.len())?;
    writeln!(out, "fragments: {}", fragments)?;
    writeln!(out, "logical rows: {}", rows)?;
    writeln!(out, "deleted blocks: {}", deleted)?;
    for (rec_type, count) in per_type {
        writeln!(out, "  type {:>2}: {}", rec_type, count)?;
    }
    Ok(())
}

fn handle_fragments(table: &TableFile, out: &mut impl Write) -> Result<()> {
    writeln!(out, "offset|type|kind|data_begin|data_len|block_len|chain")?;
    for fragment in table.fragments() {
        let descriptor = &fragment.descriptor;
        writeln!(
            out,
            "{}|{}|{}|{}|{}|{}|{}",
            fragment.offset,
            descriptor.rec_type,
            fragment.kind,
            descriptor.data_begin,
            descriptor.data_len,
            descriptor.block_len,
            descriptor.chain_len()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::fragment;

    fn sample_table() -> TableFile {
        let mut row = vec![0u8, 0, 0, 1, b'%', 4];
        row.extend_from_slice(b"root*");
        row.extend_from_slice(&[b'F'; 40]);
        let mut file = fragment(1, &row, 0, None);
        file.resize(crate::record::align_block(file.len()), 0);
        TableFile::from_bytes(file)
    }

    fn output(command: Command) -> String {
        let mut out = Vec::new();
        run_command(&sample_table(), ServerVersion::Current, command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn users_prints_account_and_hash() {
        assert_eq!(output(Command::Users), format!("root:{}\n", "F".repeat(40)));
    }

    #[test]
    fn info_counts_fragments() {
        let text = output(Command::Info);
        assert!(text.contains("fragments: 1\n"));
        assert!(text.contains("logical rows: 1\n"));
        assert!(text.contains("deleted blocks: 0\n"));
        assert!(text.contains("  type  1: 1\n"));
    }

    #[test]
    fn fragments_lists_layout() {
        let text = output(Command::Fragments);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "0|1|row|3|51|56|1");
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut out = Vec::new();
        let err = execute_command(
            Path::new("/nonexistent/user.MYD"),
            ServerVersion::Current,
            Command::Users,
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/user.MYD"));
    }
}
