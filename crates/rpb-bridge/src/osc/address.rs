//! OSC address table

use rpb_core::ObjectId;

/// Address prefix of every object; addressing segments are appended
pub fn address_of(object: ObjectId) -> &'static str {
    use ObjectId::*;
    match object {
        HeartbeatPing => "/ping",
        HeartbeatPong => "/pong",
        SettingsDeviceName => "/dbaudio1/settings/devicename",
        ErrorGeneral => "/dbaudio1/error/gnrlerr",
        ErrorText => "/dbaudio1/error/errortext",
        StatusText => "/dbaudio1/status/statustext",
        MatrixInputMute => "/dbaudio1/matrixinput/mute",
        MatrixInputGain => "/dbaudio1/matrixinput/gain",
        MatrixInputDelay => "/dbaudio1/matrixinput/delay",
        MatrixInputDelayEnable => "/dbaudio1/matrixinput/delayenable",
        MatrixInputEqEnable => "/dbaudio1/matrixinput/eqenable",
        MatrixInputPolarity => "/dbaudio1/matrixinput/polarity",
        MatrixInputChannelName => "/dbaudio1/matrixinput/channelname",
        MatrixInputLevelMeterPreMute => "/dbaudio1/matrixinput/levelmeterpremute",
        MatrixInputLevelMeterPostMute => "/dbaudio1/matrixinput/levelmeterpostmute",
        MatrixInputReverbSendGain => "/dbaudio1/matrixinput/reverbsendgain",
        MatrixNodeEnable => "/dbaudio1/matrixnode/enable",
        MatrixNodeGain => "/dbaudio1/matrixnode/gain",
        MatrixNodeDelayEnable => "/dbaudio1/matrixnode/delayenable",
        MatrixNodeDelay => "/dbaudio1/matrixnode/delay",
        MatrixOutputMute => "/dbaudio1/matrixoutput/mute",
        MatrixOutputGain => "/dbaudio1/matrixoutput/gain",
        MatrixOutputDelay => "/dbaudio1/matrixoutput/delay",
        MatrixOutputDelayEnable => "/dbaudio1/matrixoutput/delayenable",
        MatrixOutputEqEnable => "/dbaudio1/matrixoutput/eqenable",
        MatrixOutputPolarity => "/dbaudio1/matrixoutput/polarity",
        MatrixOutputChannelName => "/dbaudio1/matrixoutput/channelname",
        MatrixOutputLevelMeterPreMute => "/dbaudio1/matrixoutput/levelmeterpremute",
        MatrixOutputLevelMeterPostMute => "/dbaudio1/matrixoutput/levelmeterpostmute",
        PositioningSourceSpread => "/dbaudio1/positioning/source_spread",
        PositioningSourceDelayMode => "/dbaudio1/positioning/source_delaymode",
        PositioningSourcePosition => "/dbaudio1/positioning/source_position",
        PositioningSourcePositionXy => "/dbaudio1/positioning/source_position_xy",
        PositioningSourcePositionX => "/dbaudio1/positioning/source_position_x",
        PositioningSourcePositionY => "/dbaudio1/positioning/source_position_y",
        CoordinateMappingSourcePosition => "/dbaudio1/coordinatemapping/source_position",
        CoordinateMappingSourcePositionXy => "/dbaudio1/coordinatemapping/source_position_xy",
        CoordinateMappingSourcePositionX => "/dbaudio1/coordinatemapping/source_position_x",
        CoordinateMappingSourcePositionY => "/dbaudio1/coordinatemapping/source_position_y",
        MatrixSettingsReverbRoomId => "/dbaudio1/matrixsettings/reverbroomid",
        MatrixSettingsReverbPredelayFactor => "/dbaudio1/matrixsettings/reverbpredelayfactor",
        MatrixSettingsReverbRearLevel => "/dbaudio1/matrixsettings/reverbrearlevel",
        ReverbInputGain => "/dbaudio1/reverbinput/gain",
        ReverbInputProcessingMute => "/dbaudio1/reverbinputprocessing/mute",
        ReverbInputProcessingGain => "/dbaudio1/reverbinputprocessing/gain",
        ReverbInputProcessingLevelMeter => "/dbaudio1/reverbinputprocessing/levelmeter",
        ReverbInputProcessingEqEnable => "/dbaudio1/reverbinputprocessing/eqenable",
        SceneIndex => "/dbaudio1/scene/sceneindex",
        ScenePrevious => "/dbaudio1/scene/previous",
        SceneNext => "/dbaudio1/scene/next",
        SceneRecall => "/dbaudio1/scene/recall",
        SceneName => "/dbaudio1/scene/scenename",
        SceneComment => "/dbaudio1/scene/scenecomment",
        SoundObjectSelect => "/RemoteProtocolBridge/SoundObjectSelect",
    }
}

/// Object whose prefix is the longest match for `address`, plus the
/// unmatched remainder (empty or starting with `/`).
pub fn match_address(address: &str) -> Option<(ObjectId, &str)> {
    ObjectId::ALL
        .iter()
        .filter_map(|&object| {
            let prefix = address_of(object);
            let rest = address.strip_prefix(prefix)?;
            (rest.is_empty() || rest.starts_with('/')).then_some((object, prefix.len(), rest))
        })
        .max_by_key(|(_, len, _)| *len)
        .map(|(object, _, rest)| (object, rest))
}
