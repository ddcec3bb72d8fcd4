// low-level driver routines for 16550a UART.

use crate::spinlock::{pop_off, push_off, Spinlock};

#[macro_export]
macro_rules! Reg {
    ( $reg:expr ) => {
        $crate::memlayout::UART0 + $reg
    };
}

// the UART control registers.
// some have different meanings for
// read vs write.
// see http://byterunner.com/16550.html
pub const RHR: u64 = 0; // receive holding register (for input bytes)
pub const THR: u64 = 0; // transmit holding register (for output bytes)
pub const IER: u64 = 1; // interrupt enable register
pub const IER_RX_ENABLE: u64 = 1 << 0;
pub const IER_TX_ENABLE: u64 = 1 << 1;
pub const FCR: u64 = 2; // FIFO control register
pub const FCR_FIFO_ENABLE: u64 = 1 << 0;
pub const FCR_FIFO_CLEAR: u64 = 3 << 1; // clear the content of the two FIFOs
pub const LCR: u64 = 3; // line control register
pub const LCR_EIGHT_BITS: u64 = 3 << 0;
pub const LCR_BAUD_LATCH: u64 = 1 << 7; // special mode to set baud rate
pub const LSR: u64 = 5; // line status register
pub const LSR_RX_READY: u64 = 1 << 0; // input is waiting to be read from RHR
pub const LSR_TX_IDLE: u64 = 1 << 5; // THR can accept another character to send
pub const UART_TX_BUF_SIZE: usize = 32;

#[macro_export]
macro_rules! ReadReg {
    ( $reg:expr ) => {
        (($crate::uart::Reg!($reg)) as *mut u8).read_volatile()
    };
}

#[macro_export]
macro_rules! WriteReg {
    ( $reg:expr, $val:expr ) => {
        (($crate::uart::Reg!($reg)) as *mut u8).write_volatile($val)
    };
}

pub struct Uart {
    tx_lock: Spinlock,
    tx_buf: [u8; UART_TX_BUF_SIZE],
    tx_w: u64,
    tx_r: u64,
}

pub static mut UART_INSTANCE: Uart = Uart::create();

impl Uart {
    const fn create() -> Self {
        Self {
            tx_lock: Spinlock::init_lock("uart"),
            tx_buf: [0; UART_TX_BUF_SIZE],
            tx_w: 0,
            tx_r: 0,
        }
    }

    pub fn init(&mut self) {
        unsafe {
            // disable interrupts.
            WriteReg!(IER, 0x00);
            // special mode to set baud rate.
            WriteReg!(LCR, LCR_BAUD_LATCH);
            // LSB / MSB for baud rate of 38.4K.
            WriteReg!(0, 0x03);
            WriteReg!(1, 0x00);
            // leave set-baud mode, 8 bits, no parity.
            WriteReg!(LCR, LCR_EIGHT_BITS);
            // reset and enable FIFOs.
            WriteReg!(FCR, FCR_FIFO_ENABLE | FCR_FIFO_CLEAR);
            // enable transmit and receive interrupts.
            WriteReg!(IER, IER_TX_ENABLE | IER_RX_ENABLE);
        }
    }

    /// add a character to the output buffer and tell the
    /// UART to start sending if it isn't already. blocks if
    /// the output buffer is full. not safe to call from
    /// interrupt context.
    pub fn putc(&mut self, c: u8) {
        self.tx_lock.acquire();

        while self.tx_w == self.tx_r + UART_TX_BUF_SIZE as u64 {
            // buffer full; the interrupt handler drains it on completion.
        }
        self.tx_buf[(self.tx_w as usize) % UART_TX_BUF_SIZE] = c;
        self.tx_w += 1;
        self.start();
        self.tx_lock.release();
    }

    /// alternate version of putc() that doesn't use interrupts,
    /// for use by kernel printf() and to echo input characters.
    /// spins waiting for the UART's output register to be empty.
    pub fn putc_sync(&self, c: u8) {
        push_off();

        unsafe {
            while (ReadReg!(LSR) & LSR_TX_IDLE) == 0 {}
            WriteReg!(THR, c);
        }

        pop_off();
    }

    /// if the UART is idle and a character is waiting in the
    /// transmit buffer, send it. caller must hold tx_lock.
    fn start(&mut self) {
        loop {
            if self.tx_w == self.tx_r {
                // buffer empty.
                return;
            }

            if unsafe { ReadReg!(LSR) } & LSR_TX_IDLE == 0 {
                // UART transmit holding register still full.
                return;
            }

            let c = self.tx_buf[(self.tx_r as usize) % UART_TX_BUF_SIZE];
            self.tx_r += 1;

            unsafe {
                WriteReg!(THR, c);
            }
        }
    }

    /// read one input character from the UART, or -1 if none waiting.
    fn getc(&self) -> i32 {
        unsafe {
            if ReadReg!(LSR) & LSR_RX_READY != 0 {
                ReadReg!(RHR) as i32
            } else {
                -1
            }
        }
    }

    /// handle a UART interrupt, raised because input has arrived,
    /// or the uart is ready for more output, or both.
    pub fn intr(&mut self) {
        loop {
            let c = self.getc();
            if c < 0 {
                break;
            }
            crate::console::consoleintr(c as u8);
        }

        self.tx_lock.acquire();
        self.start();
        self.tx_lock.release();
    }
}
