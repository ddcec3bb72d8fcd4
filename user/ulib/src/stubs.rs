extern "C" {
    // system calls

    // Create a process, return child's PID.
    pub fn fork() -> i32;

    // Terminate the current process; status reported to wait(). No return.
    pub fn exit(status: i32) -> !;

    // Wait for a child to exit; exit status in *status; returns child PID.
    pub fn wait(addr: *const u8) -> i32;

    // Create a pipe, put read/write file descriptors in p[0] and p[1].
    pub fn pipe(fdarray: *const i32) -> i32;

    // Write n bytes from buf to file descriptor fd; returns n.
    pub fn write(fd: i32, addr: *const u8, n: i32) -> i32;

    // Read n bytes into buf; returns number read; or 0 if end of file.
    pub fn read(fd: i32, addr: *mut u8, n: i32) -> i32;

    // Release open file fd.
    pub fn close(fd: i32);

    // Load a file and execute it with arguments; only returns if error.
    pub fn exec(path: *const u8, argv: *const *const u8) -> i32;

    // Open a file; flags indicate read/write; returns an fd.
    pub fn open(path: *const u8, omode: u64) -> i32;

    // Create a device file.
    pub fn mknod(path: *const u8, major: u16, minor: u16) -> i32;

    // Change the current directory.
    pub fn chdir(path: *const u8) -> i32;

    // Return a new file descriptor referring to the same file as fd.
    pub fn dup(fd: i32) -> i32;

    // Grow process's memory by n zero bytes. Returns start of new memory.
    pub fn sbrk(n: u32) -> *mut u8;

    // Recovery-subsystem syscalls (C8's user-facing surface).

    // Toggle global recovery mode: 0 = conservative, nonzero = aggressive.
    pub fn change_recovery_mode(aggressive: i32) -> i32;

    // Turn the user-cooperation protocol on/off for this process tree.
    pub fn enable_user_coop() -> i32;
    pub fn disable_user_coop() -> i32;

    // Is fd RESERVED (its underlying object was lost to a recovery)?
    pub fn check_reserved_fd(fd: i32) -> i32;

    // Does this process hold any RESERVED descriptor at all?
    pub fn check_reserved_fd_all() -> i32;

    // Return the first RESERVED descriptor, or -1 if none.
    pub fn pick_fd() -> i32;

    // Re-open a RESERVED descriptor using its recorded (path, mode).
    // Returns the same fd on success, -1 on failure.
    pub fn reopen(fd: i32) -> i32;
}
