use docsis_core::MacAddress;

/// Unit data from the layer above, to be sent over the cable MAC
#[derive(Debug)]
pub struct UpperUnitdataReq {
    pub packet: Vec<u8>,
    pub dest: MacAddress,
    pub protocol: u16,
}

/// Unit data received over the cable MAC, for the layer above
#[derive(Debug)]
pub struct UpperUnitdataInd {
    pub packet: Vec<u8>,
    pub src: MacAddress,
    pub dst: MacAddress,
    pub protocol: u16,
}
