// On-disk and in-core file-type tags, shared between the file system
// and the file table.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FileType {
    Unused,
    Dir,
    File,
    Device,
}

#[derive(Copy, Clone)]
pub struct Stat {
    pub dev: i32,          // File system's disk device
    pub ino: u32,          // Inode number
    pub file_type: FileType,
    pub nlink: i16,        // Number of links to file
    pub size: u64,         // Size of file in bytes
}
