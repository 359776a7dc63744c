//! Transaction grouping and cell-edit merging.

use super::{Command, Mutation};
use crate::error::{Result, SheetError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionKind {
    General,
    /// Typing into cells; consecutive writes to one table fold together.
    CellEdit,
}

#[derive(Clone, Debug)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub commands: Vec<Command>,
}

impl Transaction {
    pub fn new(kind: TransactionKind) -> Transaction {
        Transaction {
            kind,
            commands: Vec::new(),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.commands.iter().flat_map(Command::render)
    }
}

/// Single-writer log of committed transactions.
#[derive(Debug, Default)]
pub struct TransactionManager {
    committed: Vec<Transaction>,
    active: Option<Transaction>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with previously rendered lines (from a history artifact).
    pub fn with_history(lines: Vec<String>) -> Self {
        let mut manager = Self::new();
        let seed = Command::script(lines);
        if !seed.is_noop() {
            manager.committed.push(Transaction {
                kind: TransactionKind::General,
                commands: vec![seed],
            });
        }
        manager
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn begin(&mut self, kind: TransactionKind) -> Result<()> {
        if self.active.is_some() {
            return Err(SheetError::TransactionActive);
        }
        self.active = Some(Transaction::new(kind));
        Ok(())
    }

    pub fn record(&mut self, command: Command) -> Result<()> {
        let active = self.active.as_mut().ok_or(SheetError::NoActiveTransaction)?;
        if active.kind == TransactionKind::CellEdit {
            if let Some(last) = active.commands.last_mut() {
                if let (Mutation::SetCells(prev), Mutation::SetCells(next)) =
                    (&last.mutation, &command.mutation)
                {
                    if prev.table_id == next.table_id {
                        let mut merged = prev.clone();
                        for (addr, value) in &next.cells {
                            merged.cells.insert(*addr, value.clone());
                        }
                        log::debug!(
                            "merged cell edit into command {} ({} cells)",
                            last.id,
                            merged.cells.len()
                        );
                        *last = Command {
                            id: last.id,
                            created_at: command.created_at,
                            mutation: Mutation::SetCells(merged),
                        };
                        return Ok(());
                    }
                }
            }
        }
        active.commands.push(command);
        Ok(())
    }

    /// Close the active transaction. Empty transactions are not kept.
    pub fn commit(&mut self) -> Result<Transaction> {
        let txn = self.active.take().ok_or(SheetError::NoActiveTransaction)?;
        if !txn.commands.is_empty() {
            self.committed.push(txn.clone());
        }
        Ok(txn)
    }

    /// Drop the active transaction without committing it.
    pub fn abort(&mut self) -> Option<Transaction> {
        self.active.take()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.committed
    }

    /// Rendered lines of every committed transaction, in order.
    pub fn all_commands(&self) -> Vec<String> {
        self.committed.iter().flat_map(Transaction::lines).collect()
    }
}
