#![no_std]
#![no_main]

use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::uart::{Config as UartConfig, Uart};
use embassy_time::Timer;
use packet_uart::{
    enable_rx_interrupt, line_errors, Activity, EmbassyClock, Gateway, HwPort, LinkConfig,
    NullRadio, PacketLink, UartRxHandler, DEFAULT_BAUD, FRAME,
};

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

#[cfg(not(feature = "uart1"))]
bind_interrupts!(struct Irqs {
    UART0_IRQ => UartRxHandler;
});

#[cfg(feature = "uart1")]
bind_interrupts!(struct Irqs {
    UART1_IRQ => UartRxHandler;
});

/// Idle delay between polls; well inside the 20 ms receive window.
const IDLE_POLL_US: u64 = 500;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("packet-uart gateway starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- UART Setup ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = DEFAULT_BAUD;

    #[cfg(not(feature = "uart1"))]
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    #[cfg(feature = "uart1")]
    let uart = Uart::new_blocking(p.UART1, p.PIN_4, p.PIN_5, uart_config);

    let config = LinkConfig::default();
    let link: PacketLink<'_, _, _> =
        PacketLink::new(&FRAME, HwPort::new(uart), EmbassyClock, config);
    let mut gateway = Gateway::new(link, NullRadio);

    enable_rx_interrupt(Irqs);
    gateway.start(DEFAULT_BAUD);

    info!(
        "link up at {} baud, timeout {} ms, waiting for packets...",
        DEFAULT_BAUD, config.timeout_ms
    );

    let mut reported_errors = 0;
    loop {
        match gateway.process_one() {
            Ok(activity) if activity == Activity::default() => {
                Timer::after_micros(IDLE_POLL_US).await;
            }
            Ok(_) => {}
            Err(e) => warn!("command failed: {}", e),
        }

        let errors = line_errors();
        if errors != reported_errors {
            warn!("uart line errors: {}", errors);
            reported_errors = errors;
        }
    }
}
