//! ESP-IDF radio backend.
//!
//! [`EspRadio`] implements the engine's radio primitives on top of
//! `esp-idf-svc`'s WiFi driver plus the raw promiscuous-mode calls.
//! [`EspInjector`] is the transmit side used from the promiscuous callback.

use std::ffi::c_void;

use anyhow::anyhow;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::{
    esp, esp_wifi_80211_tx, esp_wifi_set_channel, esp_wifi_set_promiscuous,
    esp_wifi_set_promiscuous_filter, esp_wifi_set_promiscuous_rx_cb, wifi_interface_t_WIFI_IF_STA,
    wifi_promiscuous_filter_t, wifi_promiscuous_pkt_t, wifi_promiscuous_pkt_type_t,
    wifi_second_chan_t_WIFI_SECOND_CHAN_NONE, EspError, WIFI_PROMIS_FILTER_MASK_DATA,
    WIFI_PROMIS_FILTER_MASK_MGMT,
};
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AccessPointInfo, AuthMethod, BlockingWifi, ClientConfiguration,
    Configuration, EspWifi,
};

use deauther::capture::CapturePipeline;
use deauther::defaults::{AP_CHANNEL, AP_PASSWORD, AP_SSID};
use deauther::error::{RadioFault, RadioOp};
use deauther::frame::MacAddr;
use deauther::radio::{CaptureFilter, Radio, RadioMode, Transmit};
use deauther::scan::{Encryption, NetworkRecord, NetworkScanner, ScanList};

/// Shared with the promiscuous callback, which runs in the WiFi driver task.
pub static PIPELINE: CapturePipeline = CapturePipeline::new();

fn fault(op: RadioOp) -> impl FnOnce(EspError) -> RadioFault {
    move |err| RadioFault::new(op, err.code())
}

pub struct EspRadio {
    wifi: BlockingWifi<EspWifi<'static>>,
    ap: AccessPointConfiguration,
}

impl EspRadio {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;
        let ap = AccessPointConfiguration {
            ssid: AP_SSID.try_into().map_err(|_| anyhow!("AP SSID too long"))?,
            password: AP_PASSWORD
                .try_into()
                .map_err(|_| anyhow!("AP password too long"))?,
            channel: AP_CHANNEL,
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        };
        Ok(Self { wifi, ap })
    }

    fn configuration(&self, mode: RadioMode) -> Configuration {
        match mode {
            // STA half stays unconnected; it is there so scans work
            RadioMode::ControlPlane => {
                Configuration::Mixed(ClientConfiguration::default(), self.ap.clone())
            }
            RadioMode::Monitor => Configuration::Client(ClientConfiguration::default()),
        }
    }
}

impl Radio for EspRadio {
    fn tear_down(&mut self) -> Result<(), RadioFault> {
        let op = RadioOp::TearDown;
        // Harmless when promiscuous mode was never on
        unsafe {
            esp_wifi_set_promiscuous_rx_cb(None);
            esp_wifi_set_promiscuous(false);
        }
        if self.wifi.is_started().map_err(fault(op))? {
            self.wifi.stop().map_err(fault(op))?;
        }
        Ok(())
    }

    fn enter_mode(&mut self, mode: RadioMode) -> Result<(), RadioFault> {
        let op = RadioOp::EnterMode(mode);
        let config = self.configuration(mode);
        self.wifi.set_configuration(&config).map_err(fault(op))?;
        self.wifi.start().map_err(fault(op))?;
        if mode == RadioMode::Monitor {
            esp!(unsafe { esp_wifi_set_promiscuous(true) }).map_err(fault(op))?;
        }
        log::info!("WiFi up in {} mode", mode.as_str());
        Ok(())
    }

    fn set_channel(&mut self, channel: u8) -> Result<(), RadioFault> {
        esp!(unsafe { esp_wifi_set_channel(channel, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE) })
            .map_err(fault(RadioOp::SetChannel(channel)))
    }

    fn register_capture_callback(&mut self, filter: CaptureFilter) -> Result<(), RadioFault> {
        let op = RadioOp::RegisterCapture;
        let mut mask = 0;
        if filter.management {
            mask |= WIFI_PROMIS_FILTER_MASK_MGMT;
        }
        if filter.data {
            mask |= WIFI_PROMIS_FILTER_MASK_DATA;
        }
        let filter = wifi_promiscuous_filter_t { filter_mask: mask };
        unsafe {
            esp!(esp_wifi_set_promiscuous_filter(&filter)).map_err(fault(op))?;
            esp!(esp_wifi_set_promiscuous_rx_cb(Some(promisc_rx_cb))).map_err(fault(op))?;
        }
        Ok(())
    }

    fn unregister_capture_callback(&mut self) -> Result<(), RadioFault> {
        esp!(unsafe { esp_wifi_set_promiscuous_rx_cb(None) })
            .map_err(fault(RadioOp::UnregisterCapture))
    }
}

fn encryption(auth: Option<AuthMethod>) -> Encryption {
    match auth {
        Some(AuthMethod::None) => Encryption::Open,
        Some(AuthMethod::WEP) => Encryption::Wep,
        Some(AuthMethod::WPA) => Encryption::WpaPsk,
        Some(AuthMethod::WPA2Personal) => Encryption::Wpa2Psk,
        Some(AuthMethod::WPAWPA2Personal) => Encryption::WpaWpa2Psk,
        Some(AuthMethod::WPA2Enterprise) => Encryption::Wpa2Enterprise,
        _ => Encryption::Unknown,
    }
}

fn record(ap: &AccessPointInfo) -> NetworkRecord {
    NetworkRecord::new(
        ap.ssid.as_str(),
        MacAddr(ap.bssid),
        ap.channel,
        ap.signal_strength,
        encryption(ap.auth_method),
    )
}

impl NetworkScanner for EspRadio {
    fn perform_scan(&mut self) -> Result<ScanList, RadioFault> {
        let found = self.wifi.scan().map_err(fault(RadioOp::Scan))?;
        let mut list = ScanList::new();
        for ap in &found {
            if list.push(record(ap)).is_err() {
                log::warn!("Scan list full, dropped {} networks", found.len() - list.len());
                break;
            }
        }
        log::info!("Scan found {} networks", found.len());
        Ok(list)
    }
}

/// Raw frame transmit on the station interface.
///
/// Stock ESP-IDF refuses deauthentication frames in `esp_wifi_80211_tx`;
/// every refusal shows up in the pipeline's `tx_errors`.
pub struct EspInjector;

impl Transmit for EspInjector {
    fn transmit_raw(&self, frame: &[u8]) -> Result<(), RadioFault> {
        esp!(unsafe {
            esp_wifi_80211_tx(
                wifi_interface_t_WIFI_IF_STA,
                frame.as_ptr() as *const c_void,
                frame.len() as i32,
                false,
            )
        })
        .map_err(fault(RadioOp::Transmit))
    }
}

/// WiFi promiscuous mode callback.
///
/// Runs in the WiFi driver task context (not ISR on ESP-IDF, but still
/// must be non-blocking). Hands the raw 802.11 frame to the pipeline.
unsafe extern "C" fn promisc_rx_cb(buf: *mut c_void, _pkt_type: wifi_promiscuous_pkt_type_t) {
    if buf.is_null() {
        return;
    }
    let pkt = unsafe { &*(buf as *const wifi_promiscuous_pkt_t) };
    let sig_len = pkt.rx_ctrl.sig_len() as usize;
    if sig_len == 0 {
        return;
    }

    // Safety: payload is `sig_len` bytes starting at pkt.payload
    let payload = unsafe { std::slice::from_raw_parts(pkt.payload.as_ptr(), sig_len) };
    PIPELINE.on_frame(payload, &EspInjector);
}
