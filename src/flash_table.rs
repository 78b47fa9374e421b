// Licensed under the Apache-2.0 license

//! Module/function lookup tables kept in persistent storage.
//!
//! Higher layers map a command byte received over the bus to a module, check
//! its access identifier and pick a handler from its function table. The bus
//! driver itself never touches these tables.

use core::fmt;

/// Size of a block copied by [`copy_block`]
pub const BLOCK_SIZE: usize = 8;

/// One command/function pair of a module's function table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionEntry {
    pub command: u16,
    pub function: u16,
}

impl FunctionEntry {
    #[must_use]
    pub const fn new(command: u16, function: u16) -> Self {
        Self { command, function }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    IndexOutOfRange,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange => f.write_str("table index out of range"),
        }
    }
}

/// Indexed access to module descriptors
pub trait ModuleTable {
    /// Access identifier of module `index`
    fn access_id(&self, index: u8) -> Option<u8>;

    /// Function table of module `index`
    fn function_table(&self, index: u8) -> Option<&[FunctionEntry]>;
}

/// Command code of entry `index`
#[must_use]
pub fn access_cmd(index: u8, table: &[FunctionEntry]) -> Option<u16> {
    table.get(usize::from(index)).map(|entry| entry.command)
}

/// Function code of entry `index`
#[must_use]
pub fn access_func(index: u8, table: &[FunctionEntry]) -> Option<u16> {
    table.get(usize::from(index)).map(|entry| entry.function)
}

/// Copy block `index` of a persistent table into working memory
///
/// # Errors
///
/// Returns `TableError::IndexOutOfRange` if `index` is past the end of
/// `table`; `dst` is left untouched.
pub fn copy_block(
    index: u16,
    table: &[[u8; BLOCK_SIZE]],
    dst: &mut [u8; BLOCK_SIZE],
) -> Result<(), TableError> {
    let block = table
        .get(usize::from(index))
        .ok_or(TableError::IndexOutOfRange)?;
    dst.copy_from_slice(block);
    Ok(())
}

/// A module as stored in the table
#[derive(Copy, Clone, Debug)]
pub struct ModuleDescriptor<'a> {
    pub access_id: u8,
    pub functions: &'a [FunctionEntry],
}

/// `ModuleTable` over a static slice of descriptors
#[derive(Copy, Clone, Debug)]
pub struct StaticModuleTable<'a> {
    modules: &'a [ModuleDescriptor<'a>],
}

impl<'a> StaticModuleTable<'a> {
    #[must_use]
    pub const fn new(modules: &'a [ModuleDescriptor<'a>]) -> Self {
        Self { modules }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleTable for StaticModuleTable<'_> {
    fn access_id(&self, index: u8) -> Option<u8> {
        self.modules
            .get(usize::from(index))
            .map(|module| module.access_id)
    }

    fn function_table(&self, index: u8) -> Option<&[FunctionEntry]> {
        self.modules
            .get(usize::from(index))
            .map(|module| module.functions)
    }
}
