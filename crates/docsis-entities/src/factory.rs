use docsis_config::SharedConfig;
use docsis_core::{DeviceKind, EntityId, MacAddress};

use crate::DocsisEntityTrait;
use crate::cm::cm_device::Cm;
use crate::cmts::cmts_device::Cmts;
use crate::hfc::hfc_medium::Hfc;
use crate::user::traffic_user::TrafficUser;

/// Builds a device of `kind` registered as `id`. The address is ignored by the
/// medium and by users.
pub fn create_device(kind: DeviceKind, id: EntityId, config: SharedConfig, address: MacAddress) -> Box<dyn DocsisEntityTrait> {
    match kind {
        DeviceKind::Hfc => Box::new(Hfc::new(id, config)),
        DeviceKind::Cmts => Box::new(Cmts::new(id, config, address)),
        DeviceKind::Cm => Box::new(Cm::new(id, config, address)),
        DeviceKind::User => Box::new(TrafficUser::new(id)),
    }
}
