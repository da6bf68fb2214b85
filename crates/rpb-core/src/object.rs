//! Remote object catalogue
//!
//! Every semantically meaningful control/telemetry parameter the bridge knows
//! about. Declaration order matters: everything declared before
//! [`ObjectId::FIRST_INTERNAL`] is bridgeable and may be handed to a data
//! handling strategy; everything from it onwards is bridge-internal (scene and
//! selection control) and only ever reaches the observer path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Addressing, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ObjectId {
    HeartbeatPing,
    HeartbeatPong,
    SettingsDeviceName,
    ErrorGeneral,
    ErrorText,
    StatusText,
    MatrixInputMute,
    MatrixInputGain,
    MatrixInputDelay,
    MatrixInputDelayEnable,
    MatrixInputEqEnable,
    MatrixInputPolarity,
    MatrixInputChannelName,
    MatrixInputLevelMeterPreMute,
    MatrixInputLevelMeterPostMute,
    MatrixInputReverbSendGain,
    MatrixNodeEnable,
    MatrixNodeGain,
    MatrixNodeDelayEnable,
    MatrixNodeDelay,
    MatrixOutputMute,
    MatrixOutputGain,
    MatrixOutputDelay,
    MatrixOutputDelayEnable,
    MatrixOutputEqEnable,
    MatrixOutputPolarity,
    MatrixOutputChannelName,
    MatrixOutputLevelMeterPreMute,
    MatrixOutputLevelMeterPostMute,
    PositioningSourceSpread,
    PositioningSourceDelayMode,
    PositioningSourcePosition,
    PositioningSourcePositionXy,
    PositioningSourcePositionX,
    PositioningSourcePositionY,
    CoordinateMappingSourcePosition,
    CoordinateMappingSourcePositionXy,
    CoordinateMappingSourcePositionX,
    CoordinateMappingSourcePositionY,
    MatrixSettingsReverbRoomId,
    MatrixSettingsReverbPredelayFactor,
    MatrixSettingsReverbRearLevel,
    ReverbInputGain,
    ReverbInputProcessingMute,
    ReverbInputProcessingGain,
    ReverbInputProcessingLevelMeter,
    ReverbInputProcessingEqEnable,
    // bridge-internal from here on
    SceneIndex,
    ScenePrevious,
    SceneNext,
    SceneRecall,
    SceneName,
    SceneComment,
    SoundObjectSelect,
}

impl ObjectId {
    /// First identifier that is never routed through a handling strategy
    pub const FIRST_INTERNAL: ObjectId = ObjectId::SceneIndex;

    /// Every identifier, in declaration order
    pub const ALL: [ObjectId; 54] = [
        ObjectId::HeartbeatPing,
        ObjectId::HeartbeatPong,
        ObjectId::SettingsDeviceName,
        ObjectId::ErrorGeneral,
        ObjectId::ErrorText,
        ObjectId::StatusText,
        ObjectId::MatrixInputMute,
        ObjectId::MatrixInputGain,
        ObjectId::MatrixInputDelay,
        ObjectId::MatrixInputDelayEnable,
        ObjectId::MatrixInputEqEnable,
        ObjectId::MatrixInputPolarity,
        ObjectId::MatrixInputChannelName,
        ObjectId::MatrixInputLevelMeterPreMute,
        ObjectId::MatrixInputLevelMeterPostMute,
        ObjectId::MatrixInputReverbSendGain,
        ObjectId::MatrixNodeEnable,
        ObjectId::MatrixNodeGain,
        ObjectId::MatrixNodeDelayEnable,
        ObjectId::MatrixNodeDelay,
        ObjectId::MatrixOutputMute,
        ObjectId::MatrixOutputGain,
        ObjectId::MatrixOutputDelay,
        ObjectId::MatrixOutputDelayEnable,
        ObjectId::MatrixOutputEqEnable,
        ObjectId::MatrixOutputPolarity,
        ObjectId::MatrixOutputChannelName,
        ObjectId::MatrixOutputLevelMeterPreMute,
        ObjectId::MatrixOutputLevelMeterPostMute,
        ObjectId::PositioningSourceSpread,
        ObjectId::PositioningSourceDelayMode,
        ObjectId::PositioningSourcePosition,
        ObjectId::PositioningSourcePositionXy,
        ObjectId::PositioningSourcePositionX,
        ObjectId::PositioningSourcePositionY,
        ObjectId::CoordinateMappingSourcePosition,
        ObjectId::CoordinateMappingSourcePositionXy,
        ObjectId::CoordinateMappingSourcePositionX,
        ObjectId::CoordinateMappingSourcePositionY,
        ObjectId::MatrixSettingsReverbRoomId,
        ObjectId::MatrixSettingsReverbPredelayFactor,
        ObjectId::MatrixSettingsReverbRearLevel,
        ObjectId::ReverbInputGain,
        ObjectId::ReverbInputProcessingMute,
        ObjectId::ReverbInputProcessingGain,
        ObjectId::ReverbInputProcessingLevelMeter,
        ObjectId::ReverbInputProcessingEqEnable,
        ObjectId::SceneIndex,
        ObjectId::ScenePrevious,
        ObjectId::SceneNext,
        ObjectId::SceneRecall,
        ObjectId::SceneName,
        ObjectId::SceneComment,
        ObjectId::SoundObjectSelect,
    ];

    /// Whether data handling strategies may see and route this object
    pub fn is_bridgeable(self) -> bool {
        (self as u16) < (Self::FIRST_INTERNAL as u16)
    }

    /// Iterator over the bridgeable part of the catalogue
    pub fn bridgeable() -> impl Iterator<Item = ObjectId> {
        Self::ALL.into_iter().filter(|id| id.is_bridgeable())
    }

    pub fn from_u16(val: u16) -> Option<Self> {
        Self::ALL.get(val as usize).copied()
    }

    /// Value type carried by this object's messages
    pub fn value_type(self) -> ValueType {
        use ObjectId::*;
        match self {
            HeartbeatPing | HeartbeatPong | ScenePrevious | SceneNext => ValueType::None,
            SettingsDeviceName | ErrorText | StatusText | MatrixInputChannelName
            | MatrixOutputChannelName | SceneIndex | SceneName | SceneComment => ValueType::String,
            ErrorGeneral
            | MatrixInputMute
            | MatrixInputDelayEnable
            | MatrixInputEqEnable
            | MatrixInputPolarity
            | MatrixNodeEnable
            | MatrixNodeDelayEnable
            | MatrixOutputMute
            | MatrixOutputDelayEnable
            | MatrixOutputEqEnable
            | MatrixOutputPolarity
            | PositioningSourceDelayMode
            | MatrixSettingsReverbRoomId
            | ReverbInputProcessingMute
            | ReverbInputProcessingEqEnable
            | SceneRecall
            | SoundObjectSelect => ValueType::Int,
            MatrixInputGain
            | MatrixInputDelay
            | MatrixInputLevelMeterPreMute
            | MatrixInputLevelMeterPostMute
            | MatrixInputReverbSendGain
            | MatrixNodeGain
            | MatrixNodeDelay
            | MatrixOutputGain
            | MatrixOutputDelay
            | MatrixOutputLevelMeterPreMute
            | MatrixOutputLevelMeterPostMute
            | PositioningSourceSpread
            | PositioningSourcePosition
            | PositioningSourcePositionXy
            | PositioningSourcePositionX
            | PositioningSourcePositionY
            | CoordinateMappingSourcePosition
            | CoordinateMappingSourcePositionXy
            | CoordinateMappingSourcePositionX
            | CoordinateMappingSourcePositionY
            | MatrixSettingsReverbPredelayFactor
            | MatrixSettingsReverbRearLevel
            | ReverbInputGain
            | ReverbInputProcessingGain
            | ReverbInputProcessingLevelMeter => ValueType::Float,
        }
    }

    /// Number of values a full (non-poll) message carries.
    ///
    /// `None` for string objects, whose count is the string's byte length.
    pub fn value_count(self) -> Option<u16> {
        use ObjectId::*;
        match self.value_type() {
            ValueType::None => Some(0),
            ValueType::String => None,
            _ => match self {
                PositioningSourcePosition | CoordinateMappingSourcePosition => Some(3),
                PositioningSourcePositionXy | CoordinateMappingSourcePositionXy => Some(2),
                _ => Some(1),
            },
        }
    }

    /// Whether messages for this object are addressed by channel
    pub fn needs_channel(self) -> bool {
        use ObjectId::*;
        !matches!(
            self,
            HeartbeatPing
                | HeartbeatPong
                | SettingsDeviceName
                | ErrorGeneral
                | ErrorText
                | StatusText
                | MatrixSettingsReverbRoomId
                | MatrixSettingsReverbPredelayFactor
                | MatrixSettingsReverbRearLevel
                | SceneIndex
                | ScenePrevious
                | SceneNext
                | SceneRecall
                | SceneName
                | SceneComment
        )
    }

    /// Whether messages for this object also carry a record (mapping) index
    pub fn needs_record(self) -> bool {
        self.is_coordinate_mapping()
            || matches!(
                self,
                ObjectId::MatrixNodeEnable
                    | ObjectId::MatrixNodeGain
                    | ObjectId::MatrixNodeDelayEnable
                    | ObjectId::MatrixNodeDelay
                    | ObjectId::ReverbInputGain
            )
    }

    /// Coordinate mapping family: addressed by source and mapping area
    pub fn is_coordinate_mapping(self) -> bool {
        matches!(
            self,
            ObjectId::CoordinateMappingSourcePosition
                | ObjectId::CoordinateMappingSourcePositionXy
                | ObjectId::CoordinateMappingSourcePositionX
                | ObjectId::CoordinateMappingSourcePositionY
        )
    }

    /// Source position family, absolute or mapped
    pub fn is_position(self) -> bool {
        self.is_coordinate_mapping()
            || matches!(
                self,
                ObjectId::PositioningSourcePosition
                    | ObjectId::PositioningSourcePositionXy
                    | ObjectId::PositioningSourcePositionX
                    | ObjectId::PositioningSourcePositionY
            )
    }

    /// Stable name used in logs and the command line catalogue
    pub fn name(self) -> &'static str {
        use ObjectId::*;
        match self {
            HeartbeatPing => "Heartbeat_Ping",
            HeartbeatPong => "Heartbeat_Pong",
            SettingsDeviceName => "Settings_DeviceName",
            ErrorGeneral => "Error_GnrlErr",
            ErrorText => "Error_ErrorText",
            StatusText => "Status_StatusText",
            MatrixInputMute => "MatrixInput_Mute",
            MatrixInputGain => "MatrixInput_Gain",
            MatrixInputDelay => "MatrixInput_Delay",
            MatrixInputDelayEnable => "MatrixInput_DelayEnable",
            MatrixInputEqEnable => "MatrixInput_EqEnable",
            MatrixInputPolarity => "MatrixInput_Polarity",
            MatrixInputChannelName => "MatrixInput_ChannelName",
            MatrixInputLevelMeterPreMute => "MatrixInput_LevelMeterPreMute",
            MatrixInputLevelMeterPostMute => "MatrixInput_LevelMeterPostMute",
            MatrixInputReverbSendGain => "MatrixInput_ReverbSendGain",
            MatrixNodeEnable => "MatrixNode_Enable",
            MatrixNodeGain => "MatrixNode_Gain",
            MatrixNodeDelayEnable => "MatrixNode_DelayEnable",
            MatrixNodeDelay => "MatrixNode_Delay",
            MatrixOutputMute => "MatrixOutput_Mute",
            MatrixOutputGain => "MatrixOutput_Gain",
            MatrixOutputDelay => "MatrixOutput_Delay",
            MatrixOutputDelayEnable => "MatrixOutput_DelayEnable",
            MatrixOutputEqEnable => "MatrixOutput_EqEnable",
            MatrixOutputPolarity => "MatrixOutput_Polarity",
            MatrixOutputChannelName => "MatrixOutput_ChannelName",
            MatrixOutputLevelMeterPreMute => "MatrixOutput_LevelMeterPreMute",
            MatrixOutputLevelMeterPostMute => "MatrixOutput_LevelMeterPostMute",
            PositioningSourceSpread => "Positioning_SourceSpread",
            PositioningSourceDelayMode => "Positioning_SourceDelayMode",
            PositioningSourcePosition => "Positioning_SourcePosition",
            PositioningSourcePositionXy => "Positioning_SourcePosition_XY",
            PositioningSourcePositionX => "Positioning_SourcePosition_X",
            PositioningSourcePositionY => "Positioning_SourcePosition_Y",
            CoordinateMappingSourcePosition => "CoordinateMapping_SourcePosition",
            CoordinateMappingSourcePositionXy => "CoordinateMapping_SourcePosition_XY",
            CoordinateMappingSourcePositionX => "CoordinateMapping_SourcePosition_X",
            CoordinateMappingSourcePositionY => "CoordinateMapping_SourcePosition_Y",
            MatrixSettingsReverbRoomId => "MatrixSettings_ReverbRoomId",
            MatrixSettingsReverbPredelayFactor => "MatrixSettings_ReverbPredelayFactor",
            MatrixSettingsReverbRearLevel => "MatrixSettings_ReverbRearLevel",
            ReverbInputGain => "ReverbInput_Gain",
            ReverbInputProcessingMute => "ReverbInputProcessing_Mute",
            ReverbInputProcessingGain => "ReverbInputProcessing_Gain",
            ReverbInputProcessingLevelMeter => "ReverbInputProcessing_LevelMeter",
            ReverbInputProcessingEqEnable => "ReverbInputProcessing_EqEnable",
            SceneIndex => "Scene_SceneIndex",
            ScenePrevious => "Scene_Previous",
            SceneNext => "Scene_Next",
            SceneRecall => "Scene_Recall",
            SceneName => "Scene_SceneName",
            SceneComment => "Scene_SceneComment",
            SoundObjectSelect => "RemoteProtocolBridge_SoundObjectSelect",
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration-time description of one addressed object instance.
///
/// Used for active (polled) object lists, never on the forwarding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: ObjectId,
    #[serde(default)]
    pub addressing: Addressing,
}

impl RemoteObject {
    pub fn new(id: ObjectId, addressing: Addressing) -> Self {
        Self { id, addressing }
    }
}
