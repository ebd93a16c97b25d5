//! Board definitions written by `micropp init`

use super::descriptor::{BoardDescriptor, DeployMethod};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Raspberry Pi Pico: arm-gcc + pico-sdk, UF2 copied onto the BOOTSEL drive
pub fn rp2040() -> BoardDescriptor {
    BoardDescriptor {
        name: "RP2040".to_string(),
        toolchain: "arm-gcc".to_string(),
        firmware_format: "uf2".to_string(),
        compile_flags: strings(&["-mcpu=cortex-m0plus", "-mthumb", "-O2", "-DPICO_BOARD=pico"]),
        libraries: strings(&[
            "hardware/gpio.h",
            "hardware/spi.h",
            "hardware/i2c.h",
            "hardware/uart.h",
            "pico/stdlib.h",
            "pico/binary_info.h",
        ]),
        description: Some("RP2040 (Raspberry Pi Pico)".to_string()),
        sdk: Some("pico-sdk".to_string()),
        include_paths: strings(&[
            "src/common/pico_stdlib_headers/include",
            "src/rp2_common/hardware_gpio/include",
            "src/rp2_common/pico_platform/include",
            "src/rp2040/hardware_regs/include",
            "src/common/pico_base_headers/include",
            "src/boards/include",
            "src/rp2_common/hardware_base/include",
            "src/rp2_common/hardware_sync/include",
            "src/rp2_common/hardware_irq/include",
            "src/rp2_common/hardware_timer/include",
            "build/generated/pico_base",
        ]),
        deploy: Some(DeployMethod::MassStorage),
        flash_command: None,
    }
}

/// ESP32: xtensa-gcc, raw BIN flashed over serial with esptool
pub fn esp32() -> BoardDescriptor {
    BoardDescriptor {
        name: "ESP32".to_string(),
        toolchain: "xtensa-gcc".to_string(),
        firmware_format: "bin".to_string(),
        compile_flags: strings(&["-DESP32", "-DCORE_DEBUG_LEVEL=0", "-mtext-section-literals"]),
        libraries: strings(&[
            "Arduino.h",
            "WiFi.h",
            "ESPmDNS.h",
            "HTTPClient.h",
            "WebServer.h",
            "Update.h",
            "FS.h",
            "SPIFFS.h",
        ]),
        description: Some("ESP32".to_string()),
        sdk: None,
        include_paths: Vec::new(),
        deploy: Some(DeployMethod::SerialFlash),
        flash_command: Some(strings(&[
            "esptool.py",
            "--chip",
            "esp32",
            "--port",
            "{address}",
            "--baud",
            "115200",
            "write_flash",
            "0x10000",
            "{firmware}",
        ])),
    }
}

pub fn builtin_boards() -> Vec<BoardDescriptor> {
    vec![rp2040(), esp32()]
}
