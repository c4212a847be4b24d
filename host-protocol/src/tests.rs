// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

use super::*;

#[test]
fn every_frame_round_trips() {
    // Exhaustive over the request space, plus every result byte and a
    // non-trivial packet id / payload.
    for raw_request in 0..=u16::MAX {
        let request = raw_request.to_le_bytes();
        let frame = [
            request[0],
            request[1],
            (raw_request >> 3) as u8,
            0xA5,
            0xDE,
            0xAD,
            0xBE,
            0xEF,
        ];
        assert_eq!(Msg::decode(&frame).encode(), frame);
    }
}

#[test]
fn known_codes_never_decode_as_unknown() {
    let known = [
        RequestType::Ping,
        RequestType::ResetDevice,
        RequestType::StartApp,
        RequestType::DevInfoBootloaderVersion,
        RequestType::DevInfoVid,
        RequestType::DevInfoPid,
        RequestType::DevInfoPrd,
        RequestType::DevInfoUid,
        RequestType::FlashInfoStartAddr,
        RequestType::FlashInfoPageSize,
        RequestType::FlashInfoNumPages,
        RequestType::AppInfoPageIdx,
        RequestType::AppInfoCrcCalc,
        RequestType::AppInfoCrcStrd,
        RequestType::PageBufferClear,
        RequestType::PageBufferReadWord,
        RequestType::PageErase,
        RequestType::PageWriteWord,
        RequestType::PageWriteBufferCalcCrc,
        RequestType::PageWriteBufferToFlash,
        RequestType::FlashReadWord,
    ];
    for request in known {
        assert_eq!(RequestType::from_raw(request.to_raw()), request);
    }
}

#[test]
fn wire_codes_are_stable() {
    // These values are shared with the host tool; changing any of them is a
    // compatibility break, not a refactor.
    assert_eq!(RequestType::Ping.to_raw(), 0x0001);
    assert_eq!(RequestType::FlashInfoPageSize.to_raw(), 0x0101);
    assert_eq!(RequestType::PageErase.to_raw(), 0x0202);
    assert_eq!(RequestType::PageWriteWord.to_raw(), 0x0203);
    assert_eq!(RequestType::PageWriteBufferToFlash.to_raw(), 0x0211);
    assert_eq!(ResultType::Ack.to_raw(), 0x01);
    assert_eq!(ResultType::ErrInvldArg.to_raw(), 0x05);
}

#[test]
fn request_encoding_is_little_endian() {
    let msg = Msg::new_request(RequestType::PageWriteBufferToFlash);
    assert_eq!(msg.encode(), [0x11, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    let ping = Msg::new_request(RequestType::Ping);
    assert_eq!(ping.encode(), [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn data_word_is_little_endian() {
    let mut msg = Msg::new_request(RequestType::PageErase);
    msg.set_data_word(0x0000_0800);
    assert_eq!(msg.data, [0x00, 0x08, 0x00, 0x00]);
    assert_eq!(msg.data_word(), 2048);
}

#[test]
fn can_id_scheme() {
    assert_eq!(CAN_BROADCAST_RX_ID, 0x780);
    assert_eq!(can_node_rx_id(0), 0x781);
    assert_eq!(can_node_tx_id(0), 0x782);
    assert_eq!(can_node_rx_id(5), 0x78B);
    assert_eq!(can_node_tx_id(5), 0x78C);
}
