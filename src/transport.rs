//! Transport collaborator interface and device wire protocol helpers
//!
//! [`Transport`] abstracts the MPSSE-style serial/GPIO device that carries
//! command bytes to the LED controller: raw pre-serialized command streams,
//! SPI packets, full-duplex SPI exchanges, and GPIO level changes. The
//! embedding application provides the concrete device; the pipeline only
//! ever calls it from the transmit worker thread.
//!
//! The free functions implement the device protocol sequences that sit on
//! top of the raw operations:
//!
//! - [`write_frame`] - one encoded frame followed by the buffer-swap packet
//! - [`await_vsync`] - poll the device-ready flag until the panel has
//!   latched the previous frame
//!
//! [`await_vsync`] is exported for integrators that want to pace
//! transmission to the device refresh, but the pipeline itself never calls
//! it; pacing policy belongs to the embedding application.

use crate::error::Result;

/// GPIO direction mask used for every chip-select change
pub const GPIO_DIRECTION: u8 = 0x2B;
/// GPIO levels with chip select released (high)
pub const GPIO_CS_HIGH: u8 = 0x28;
/// GPIO levels with chip select asserted (low)
pub const GPIO_CS_LOW: u8 = 0x00;

/// SPI packet telling the controller to latch the freshly sent frame
pub const FRAME_SWAP_COMMAND: [u8; 2] = [0x04, 0x00];
/// Probe packet clocked out while polling for device readiness
pub const VSYNC_PROBE: [u8; 2] = [0x00, 0x00];
/// Bit set in either response byte once the device is ready
pub const VSYNC_READY_MASK: u8 = 0x02;

/// Byte-level access to the serial/GPIO device driving the panel
///
/// Implementations may block or buffer internally at their discretion; the
/// pipeline treats every call as opaque. `Send` is required so the transmit
/// worker can own the device.
pub trait Transport: Send {
    /// Send pre-serialized command bytes verbatim
    fn send_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Send one SPI data packet
    fn send_spi(&mut self, bytes: &[u8]) -> Result<()>;

    /// Full-duplex SPI exchange; `bytes` is replaced by the response
    fn exchange_spi(&mut self, bytes: &mut [u8]) -> Result<()>;

    /// Drive the GPIO bank to `levels` with the given direction mask
    fn set_gpio(&mut self, levels: u8, direction: u8) -> Result<()>;
}

/// Assert (`true`) or release (`false`) the controller's chip select
pub fn set_chip_select<T: Transport + ?Sized>(transport: &mut T, asserted: bool) -> Result<()> {
    let levels = if asserted { GPIO_CS_LOW } else { GPIO_CS_HIGH };
    transport.set_gpio(levels, GPIO_DIRECTION)
}

/// Transmit one encoded frame and tell the controller to latch it
///
/// The command stream already carries its own chip-select framing; only the
/// trailing swap packet needs explicit wrapping.
pub fn write_frame<T: Transport + ?Sized>(transport: &mut T, commands: &[u8]) -> Result<()> {
    transport.send_raw(commands)?;

    set_chip_select(transport, true)?;
    transport.send_spi(&FRAME_SWAP_COMMAND)?;
    set_chip_select(transport, false)?;
    Ok(())
}

/// Block until the device reports it is ready for the next frame
///
/// Repeatedly exchanges a two-byte probe and checks the response against
/// [`VSYNC_READY_MASK`]. Exported for integrators that want to pace
/// transmission; the pipeline does not call this.
pub fn await_vsync<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    loop {
        let mut probe = VSYNC_PROBE;
        set_chip_select(transport, true)?;
        transport.exchange_spi(&mut probe)?;
        set_chip_select(transport, false)?;
        if (probe[0] | probe[1]) & VSYNC_READY_MASK == VSYNC_READY_MASK {
            return Ok(());
        }
    }
}
