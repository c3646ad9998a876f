use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliTrackerStore {
    Memory,
    File,
}

impl CliTrackerStore {
    pub fn as_str(self) -> &'static str {
        match self {
            CliTrackerStore::Memory => "memory",
            CliTrackerStore::File => "file",
        }
    }
}
