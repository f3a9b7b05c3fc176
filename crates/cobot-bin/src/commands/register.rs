// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` and `write` commands.

use cobot_config::CobotConfig;
use cobot_modbus::ModbusDeviceClient;
use tracing::info;

use super::open_transport;
use crate::cli::{ReadArgs, RegisterTarget, WriteArgs};
use crate::error::{BinError, BinResult};

/// Resolves the register address, looking cells up in the motor mapping.
pub fn resolve_register(config: &CobotConfig, target: &RegisterTarget) -> BinResult<u16> {
    match (target.register, target.cell) {
        (Some(register), None) => Ok(register),
        (None, Some(cell)) => Ok(config.cells.motor_address(cell)?),
        _ => Err(BinError::input("exactly one of --register or --cell is required")),
    }
}

/// Executes the `read` command.
pub async fn read(config: &CobotConfig, args: ReadArgs) -> BinResult<()> {
    let target = args.target;
    let register = resolve_register(config, &target)?;
    let slave = target.slave.unwrap_or(config.modbus.slave_address);

    let transport = open_transport(config)?;
    let client = ModbusDeviceClient::new(transport.clone(), slave)?;
    let result = client.read_register(register, target.decimals).await;
    transport.close().await;
    let value = result?;

    info!(slave, register, value, "Register read");
    println!("{}", value);
    Ok(())
}

/// Executes the `write` command.
pub async fn write(config: &CobotConfig, args: WriteArgs) -> BinResult<()> {
    let target = args.target;
    let register = resolve_register(config, &target)?;
    let slave = target.slave.unwrap_or(config.modbus.slave_address);

    let transport = open_transport(config)?;
    let client = ModbusDeviceClient::new(transport.clone(), slave)?;
    let result = client
        .write_register(register, args.value, target.decimals)
        .await;
    transport.close().await;
    result?;

    info!(slave, register, value = args.value, "Register written");
    println!("Wrote {} to register {} on slave {}", args.value, register, slave);
    Ok(())
}
