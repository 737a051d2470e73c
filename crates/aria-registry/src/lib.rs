//! aria-registry: Plugin catalogue
//!
//! Maps stable string ids to effect and instrument factories. The
//! catalogue is built once and never mutated; every lookup hands back a
//! fresh boxed instance, so callers own their processor state outright
//! and ids stay decoupled from concrete types.

use std::collections::BTreeMap;

use aria_effects::EffectProcessor;
use aria_effects::compressor::{Compressor, CompressorMode};
use aria_effects::delay::{DelayMode, EchoDelay};
use aria_effects::distortion::{Distortion, DistortionMode};
use aria_effects::dynamics::{Dynamics, DynamicsMode};
use aria_effects::eq::{EqMode, Equalizer};
use aria_effects::microphone::{MicColoration, MicModel};
use aria_effects::modulation::{ModulationMode, Modulator};
use aria_effects::reverb::{Reverb, ReverbStyle};
use aria_effects::vocal::{VocalChain, VocalMode};
use aria_synth::InstrumentSynth;
use aria_synth::analog::{AnalogModel, AnalogSynth};
use aria_synth::bass::{Bass, BassModel};
use aria_synth::drums::{DrumKit, Drums};
use aria_synth::fm::{FmModel, FmSynth};
use aria_synth::pads::{Pad, PadModel};
use aria_synth::piano::{Piano, PianoModel};
use aria_synth::plucked::{PluckedModel, PluckedSynth};
use aria_synth::strings::{Strings, StringsModel};
use aria_synth::wavetable_synth::{WavetableModel, WavetableSynth};
use log::debug;

type EffectFactory = fn() -> Box<dyn EffectProcessor>;
type SynthFactory = fn() -> Box<dyn InstrumentSynth>;

struct Entry<F> {
    family: &'static str,
    make: F,
}

macro_rules! effect {
    ($id:literal, $family:literal, $ctor:expr) => {
        (
            $id,
            Entry::<EffectFactory> {
                family: $family,
                make: || Box::new($ctor),
            },
        )
    };
}

macro_rules! synth {
    ($id:literal, $family:literal, $ctor:expr) => {
        (
            $id,
            Entry::<SynthFactory> {
                family: $family,
                make: || Box::new($ctor),
            },
        )
    };
}

/// Immutable id → factory catalogue for the whole processor set.
pub struct PluginRegistry {
    effects: BTreeMap<&'static str, Entry<EffectFactory>>,
    instruments: BTreeMap<&'static str, Entry<SynthFactory>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        let effects: BTreeMap<_, _> = [
            // Reverbs
            effect!("mb-plate-reverb", "reverb", Reverb::new(ReverbStyle::Plate)),
            effect!("dark-plate-reverb", "reverb", Reverb::new(ReverbStyle::DarkPlate)),
            effect!("studio-hall-reverb", "reverb", Reverb::new(ReverbStyle::Hall)),
            effect!("small-room-reverb", "reverb", Reverb::new(ReverbStyle::Room)),
            effect!("chamber-reverb", "reverb", Reverb::new(ReverbStyle::Chamber)),
            effect!("spring-reverb", "reverb", Reverb::new(ReverbStyle::Spring)),
            effect!("shimmer-reverb", "reverb", Reverb::new(ReverbStyle::Shimmer)),
            effect!("cathedral-reverb", "reverb", Reverb::new(ReverbStyle::Cathedral)),
            effect!("ambience-reverb", "reverb", Reverb::new(ReverbStyle::Ambience)),
            effect!("gated-reverb", "reverb", Reverb::new(ReverbStyle::Gated)),
            // Delays
            effect!("stereo-delay", "delay", EchoDelay::new(DelayMode::Stereo)),
            effect!("ping-pong-delay", "delay", EchoDelay::new(DelayMode::PingPong)),
            effect!("tape-echo", "delay", EchoDelay::new(DelayMode::Tape)),
            effect!("analog-delay", "delay", EchoDelay::new(DelayMode::Analog)),
            effect!("slapback-delay", "delay", EchoDelay::new(DelayMode::Slapback)),
            effect!("dub-delay", "delay", EchoDelay::new(DelayMode::Dub)),
            effect!("multi-tap-delay", "delay", EchoDelay::new(DelayMode::MultiTap)),
            effect!("reverse-delay", "delay", EchoDelay::new(DelayMode::Reverse)),
            effect!("dotted-eighth-delay", "delay", EchoDelay::new(DelayMode::DottedEighth)),
            effect!("modulated-delay", "delay", EchoDelay::new(DelayMode::Modulated)),
            // Compressors
            effect!("studio-vca-compressor", "compressor", Compressor::new(CompressorMode::StudioVca)),
            effect!("opto-compressor", "compressor", Compressor::new(CompressorMode::Opto)),
            effect!("fet-compressor", "compressor", Compressor::new(CompressorMode::Fet)),
            effect!("vari-mu-compressor", "compressor", Compressor::new(CompressorMode::VariMu)),
            effect!("bus-compressor", "compressor", Compressor::new(CompressorMode::Bus)),
            effect!("multiband-compressor", "compressor", Compressor::new(CompressorMode::Multiband)),
            effect!("parallel-compressor", "compressor", Compressor::new(CompressorMode::Parallel)),
            effect!("vintage-compressor", "compressor", Compressor::new(CompressorMode::Vintage)),
            effect!("soft-knee-compressor", "compressor", Compressor::new(CompressorMode::SoftKnee)),
            effect!("peak-compressor", "compressor", Compressor::new(CompressorMode::Peak)),
            // Equalizers
            effect!("parametric-eq", "eq", Equalizer::new(EqMode::Parametric)),
            effect!("graphic-eq", "eq", Equalizer::new(EqMode::Graphic)),
            effect!("dynamic-eq", "eq", Equalizer::new(EqMode::Dynamic)),
            effect!("mid-side-eq", "eq", Equalizer::new(EqMode::MidSide)),
            effect!("tilt-eq", "eq", Equalizer::new(EqMode::Tilt)),
            effect!("vintage-eq", "eq", Equalizer::new(EqMode::Vintage)),
            effect!("baxandall-eq", "eq", Equalizer::new(EqMode::Baxandall)),
            effect!("filter-eq", "eq", Equalizer::new(EqMode::Filter)),
            effect!("air-eq", "eq", Equalizer::new(EqMode::Air)),
            effect!("notch-eq", "eq", Equalizer::new(EqMode::Notch)),
            // Distortions
            effect!("tube-saturator", "distortion", Distortion::new(DistortionMode::Tube)),
            effect!("tape-saturator", "distortion", Distortion::new(DistortionMode::Tape)),
            effect!("transistor-fuzz", "distortion", Distortion::new(DistortionMode::Fuzz)),
            effect!("soft-clipper", "distortion", Distortion::new(DistortionMode::SoftClip)),
            effect!("hard-clipper", "distortion", Distortion::new(DistortionMode::HardClip)),
            effect!("bitcrusher", "distortion", Distortion::new(DistortionMode::Bitcrush)),
            effect!("wavefolder", "distortion", Distortion::new(DistortionMode::Wavefold)),
            effect!("overdrive", "distortion", Distortion::new(DistortionMode::Overdrive)),
            effect!("amp-simulator", "distortion", Distortion::new(DistortionMode::AmpSim)),
            effect!("exciter", "distortion", Distortion::new(DistortionMode::Exciter)),
            // Modulation
            effect!("chorus", "modulation", Modulator::new(ModulationMode::Chorus)),
            effect!("ensemble-chorus", "modulation", Modulator::new(ModulationMode::EnsembleChorus)),
            effect!("dimension-chorus", "modulation", Modulator::new(ModulationMode::DimensionChorus)),
            effect!("flanger", "modulation", Modulator::new(ModulationMode::Flanger)),
            effect!("vibrato", "modulation", Modulator::new(ModulationMode::Vibrato)),
            effect!("phaser", "modulation", Modulator::new(ModulationMode::Phaser)),
            effect!("tremolo", "modulation", Modulator::new(ModulationMode::Tremolo)),
            effect!("auto-pan", "modulation", Modulator::new(ModulationMode::AutoPan)),
            effect!("ring-modulator", "modulation", Modulator::new(ModulationMode::RingMod)),
            effect!("rotary-speaker", "modulation", Modulator::new(ModulationMode::RotarySpeaker)),
            // Dynamics
            effect!("noise-gate", "dynamics", Dynamics::new(DynamicsMode::NoiseGate)),
            effect!("expander", "dynamics", Dynamics::new(DynamicsMode::Expander)),
            effect!("de-esser", "dynamics", Dynamics::new(DynamicsMode::DeEsser)),
            effect!("ducker", "dynamics", Dynamics::new(DynamicsMode::Ducker)),
            effect!("transient-shaper", "dynamics", Dynamics::new(DynamicsMode::TransientShaper)),
            effect!("lookahead-limiter", "dynamics", Dynamics::new(DynamicsMode::LookaheadLimiter)),
            effect!("maximizer", "dynamics", Dynamics::new(DynamicsMode::Maximizer)),
            effect!("leveler", "dynamics", Dynamics::new(DynamicsMode::Leveler)),
            effect!("envelope-shaper", "dynamics", Dynamics::new(DynamicsMode::EnvelopeShaper)),
            effect!("brickwall-clipper", "dynamics", Dynamics::new(DynamicsMode::BrickwallClipper)),
            // Vocal chains
            effect!("vocal-air", "vocal", VocalChain::new(VocalMode::Air)),
            effect!("vocal-warmth", "vocal", VocalChain::new(VocalMode::Warmth)),
            effect!("vocal-presence", "vocal", VocalChain::new(VocalMode::Presence)),
            effect!("vocal-radio", "vocal", VocalChain::new(VocalMode::Radio)),
            effect!("vocal-telephone", "vocal", VocalChain::new(VocalMode::Telephone)),
            effect!("vocal-podcast", "vocal", VocalChain::new(VocalMode::Podcast)),
            effect!("vocal-broadcast", "vocal", VocalChain::new(VocalMode::Broadcast)),
            effect!("vocal-smooth", "vocal", VocalChain::new(VocalMode::Smooth)),
            effect!("vocal-crisp", "vocal", VocalChain::new(VocalMode::Crisp)),
            effect!("vocal-vintage", "vocal", VocalChain::new(VocalMode::Vintage)),
            // Microphone models
            effect!("mic-studio-condenser", "microphone", MicColoration::new(MicModel::StudioCondenser)),
            effect!("mic-vintage-tube", "microphone", MicColoration::new(MicModel::VintageTube)),
            effect!("mic-vintage-ribbon", "microphone", MicColoration::new(MicModel::VintageRibbon)),
            effect!("mic-broadcast-dynamic", "microphone", MicColoration::new(MicModel::BroadcastDynamic)),
            effect!("mic-small-diaphragm", "microphone", MicColoration::new(MicModel::SmallDiaphragm)),
            effect!("mic-handheld-stage", "microphone", MicColoration::new(MicModel::HandheldStage)),
            effect!("mic-lavalier", "microphone", MicColoration::new(MicModel::Lavalier)),
            effect!("mic-boundary", "microphone", MicColoration::new(MicModel::Boundary)),
            effect!("mic-shotgun", "microphone", MicColoration::new(MicModel::Shotgun)),
            effect!("mic-drum-room", "microphone", MicColoration::new(MicModel::DrumRoom)),
        ]
        .into_iter()
        .collect();

        let instruments: BTreeMap<_, _> = [
            // Pianos
            synth!("grand-piano", "piano", Piano::new(PianoModel::Grand)),
            synth!("upright-piano", "piano", Piano::new(PianoModel::Upright)),
            synth!("felt-piano", "piano", Piano::new(PianoModel::Felt)),
            synth!("honky-tonk-piano", "piano", Piano::new(PianoModel::HonkyTonk)),
            synth!("electric-tine-piano", "piano", Piano::new(PianoModel::ElectricTine)),
            synth!("electric-reed-piano", "piano", Piano::new(PianoModel::ElectricReed)),
            synth!("dx-e-piano", "piano", Piano::new(PianoModel::DxEPiano)),
            synth!("toy-piano", "piano", Piano::new(PianoModel::Toy)),
            synth!("bell-piano", "piano", Piano::new(PianoModel::Bell)),
            synth!("harpsichord", "piano", Piano::new(PianoModel::Harpsichord)),
            // Strings
            synth!("string-ensemble", "strings", Strings::new(StringsModel::Ensemble)),
            synth!("chamber-strings", "strings", Strings::new(StringsModel::Chamber)),
            synth!("solo-violin", "strings", Strings::new(StringsModel::SoloViolin)),
            synth!("cello-section", "strings", Strings::new(StringsModel::CelloSection)),
            synth!("pizzicato-strings", "strings", Strings::new(StringsModel::Pizzicato)),
            synth!("tremolo-strings", "strings", Strings::new(StringsModel::Tremolo)),
            synth!("octave-strings", "strings", Strings::new(StringsModel::Octave)),
            synth!("synth-strings", "strings", Strings::new(StringsModel::Synth)),
            synth!("warm-strings", "strings", Strings::new(StringsModel::Warm)),
            synth!("baroque-strings", "strings", Strings::new(StringsModel::Baroque)),
            // Drum kits
            synth!("acoustic-drums", "drums", Drums::new(DrumKit::Acoustic)),
            synth!("room-drums", "drums", Drums::new(DrumKit::Room)),
            synth!("brush-drums", "drums", Drums::new(DrumKit::Brush)),
            synth!("lo-fi-drums", "drums", Drums::new(DrumKit::LoFi)),
            synth!("808-drums", "drums", Drums::new(DrumKit::Machine808)),
            synth!("909-drums", "drums", Drums::new(DrumKit::Machine909)),
            synth!("trap-drums", "drums", Drums::new(DrumKit::Trap)),
            synth!("industrial-drums", "drums", Drums::new(DrumKit::Industrial)),
            synth!("percussion-kit", "drums", Drums::new(DrumKit::Percussion)),
            synth!("vinyl-drums", "drums", Drums::new(DrumKit::Vinyl)),
            // Basses
            synth!("analog-bass", "bass", Bass::new(BassModel::Analog)),
            synth!("sub-bass", "bass", Bass::new(BassModel::Sub)),
            synth!("acid-bass", "bass", Bass::new(BassModel::Acid)),
            synth!("fm-bass", "bass", Bass::new(BassModel::Fm)),
            synth!("reese-bass", "bass", Bass::new(BassModel::Reese)),
            synth!("wobble-bass", "bass", Bass::new(BassModel::Wobble)),
            synth!("slap-bass", "bass", Bass::new(BassModel::Slap)),
            synth!("pick-bass", "bass", Bass::new(BassModel::Pick)),
            synth!("upright-bass", "bass", Bass::new(BassModel::Upright)),
            synth!("synth-bass", "bass", Bass::new(BassModel::Synth)),
            // Pads
            synth!("warm-pad", "pads", Pad::new(PadModel::Warm)),
            synth!("dark-pad", "pads", Pad::new(PadModel::Dark)),
            synth!("glass-pad", "pads", Pad::new(PadModel::Glass)),
            synth!("choir-pad", "pads", Pad::new(PadModel::Choir)),
            synth!("sweep-pad", "pads", Pad::new(PadModel::Sweep)),
            synth!("ambient-pad", "pads", Pad::new(PadModel::Ambient)),
            synth!("shimmer-pad", "pads", Pad::new(PadModel::Shimmer)),
            synth!("motion-pad", "pads", Pad::new(PadModel::Motion)),
            synth!("vintage-pad", "pads", Pad::new(PadModel::Vintage)),
            synth!("hollow-pad", "pads", Pad::new(PadModel::Hollow)),
            // Virtual analog
            synth!("analog-lead", "analog", AnalogSynth::new(AnalogModel::Lead)),
            synth!("analog-brass", "analog", AnalogSynth::new(AnalogModel::Brass)),
            synth!("analog-pluck", "analog", AnalogSynth::new(AnalogModel::Pluck)),
            synth!("analog-keys", "analog", AnalogSynth::new(AnalogModel::Keys)),
            synth!("poly-analog", "analog", AnalogSynth::new(AnalogModel::Poly)),
            synth!("mono-lead", "analog", AnalogSynth::new(AnalogModel::MonoLead)),
            synth!("pwm-lead", "analog", AnalogSynth::new(AnalogModel::PwmLead)),
            synth!("sync-lead", "analog", AnalogSynth::new(AnalogModel::SyncLead)),
            synth!("glide-lead", "analog", AnalogSynth::new(AnalogModel::GlideLead)),
            synth!("analog-organ", "analog", AnalogSynth::new(AnalogModel::Organ)),
            // FM
            synth!("fm-bell", "fm", FmSynth::new(FmModel::Bell)),
            synth!("fm-keys", "fm", FmSynth::new(FmModel::Keys)),
            synth!("fm-pluck", "fm", FmSynth::new(FmModel::Pluck)),
            synth!("fm-brass", "fm", FmSynth::new(FmModel::Brass)),
            synth!("fm-organ", "fm", FmSynth::new(FmModel::Organ)),
            synth!("fm-lead", "fm", FmSynth::new(FmModel::Lead)),
            synth!("fm-marimba", "fm", FmSynth::new(FmModel::Marimba)),
            synth!("fm-glass", "fm", FmSynth::new(FmModel::Glass)),
            synth!("fm-growl", "fm", FmSynth::new(FmModel::Growl)),
            synth!("fm-chime", "fm", FmSynth::new(FmModel::Chime)),
            // Wavetable
            synth!("wavetable-lead", "wavetable", WavetableSynth::new(WavetableModel::Lead)),
            synth!("wavetable-pad", "wavetable", WavetableSynth::new(WavetableModel::Pad)),
            synth!("wavetable-pluck", "wavetable", WavetableSynth::new(WavetableModel::Pluck)),
            synth!("wavetable-keys", "wavetable", WavetableSynth::new(WavetableModel::Keys)),
            synth!("wavetable-sweep", "wavetable", WavetableSynth::new(WavetableModel::Sweep)),
            synth!("wavetable-formant", "wavetable", WavetableSynth::new(WavetableModel::Formant)),
            synth!("wavetable-digital", "wavetable", WavetableSynth::new(WavetableModel::Digital)),
            synth!("wavetable-bell", "wavetable", WavetableSynth::new(WavetableModel::Bell)),
            synth!("wavetable-motion", "wavetable", WavetableSynth::new(WavetableModel::Motion)),
            synth!("wavetable-bass", "wavetable", WavetableSynth::new(WavetableModel::Bass)),
            // Plucked and mallet
            synth!("plucked-string", "plucked", PluckedSynth::new(PluckedModel::String)),
            synth!("nylon-guitar", "plucked", PluckedSynth::new(PluckedModel::NylonGuitar)),
            synth!("steel-guitar", "plucked", PluckedSynth::new(PluckedModel::SteelGuitar)),
            synth!("harp", "plucked", PluckedSynth::new(PluckedModel::Harp)),
            synth!("kalimba", "plucked", PluckedSynth::new(PluckedModel::Kalimba)),
            synth!("music-box", "plucked", PluckedSynth::new(PluckedModel::MusicBox)),
            synth!("marimba", "plucked", PluckedSynth::new(PluckedModel::Marimba)),
            synth!("vibraphone", "plucked", PluckedSynth::new(PluckedModel::Vibraphone)),
            synth!("steel-drum", "plucked", PluckedSynth::new(PluckedModel::SteelDrum)),
            synth!("celesta", "plucked", PluckedSynth::new(PluckedModel::Celesta)),
        ]
        .into_iter()
        .collect();

        Self {
            effects,
            instruments,
        }
    }

    /// Instantiate a fresh effect for `id`, or `None` if unknown.
    pub fn get_effect(&self, id: &str) -> Option<Box<dyn EffectProcessor>> {
        let entry = self.effects.get(id)?;
        debug!("instantiating effect '{id}' (family {})", entry.family);
        Some((entry.make)())
    }

    /// Instantiate a fresh instrument for `id`, or `None` if unknown.
    pub fn get_instrument(&self, id: &str) -> Option<Box<dyn InstrumentSynth>> {
        let entry = self.instruments.get(id)?;
        debug!("instantiating instrument '{id}' (family {})", entry.family);
        Some((entry.make)())
    }

    /// All effect ids, sorted.
    pub fn list_effects(&self) -> Vec<&'static str> {
        self.effects.keys().copied().collect()
    }

    /// All instrument ids, sorted.
    pub fn list_instruments(&self) -> Vec<&'static str> {
        self.instruments.keys().copied().collect()
    }

    /// Ids grouped by family, across both catalogues.
    pub fn processor_info(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        let mut info: BTreeMap<&'static str, Vec<&'static str>> = BTreeMap::new();
        let effects = self.effects.iter().map(|(id, e)| (*id, e.family));
        let instruments = self.instruments.iter().map(|(id, e)| (*id, e.family));
        for (id, family) in effects.chain(instruments) {
            info.entry(family).or_default().push(id);
        }
        info
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_counts() {
        let registry = PluginRegistry::new();
        assert_eq!(registry.list_effects().len(), 90);
        assert_eq!(registry.list_instruments().len(), 90);
    }

    #[test]
    fn test_unknown_id_is_none() {
        let registry = PluginRegistry::new();
        assert!(registry.get_effect("nonexistent").is_none());
        assert!(registry.get_instrument("nonexistent").is_none());
        // Catalogues do not bleed into each other.
        assert!(registry.get_effect("grand-piano").is_none());
        assert!(registry.get_instrument("mb-plate-reverb").is_none());
    }

    #[test]
    fn test_lookup_returns_fresh_instances() {
        let registry = PluginRegistry::new();
        let a = registry.get_effect("mb-plate-reverb");
        let b = registry.get_effect("mb-plate-reverb");
        assert!(a.is_some() && b.is_some());
    }

    #[test]
    fn test_families_are_balanced() {
        let registry = PluginRegistry::new();
        let info = registry.processor_info();
        assert_eq!(info.len(), 18);
        for (family, ids) in &info {
            assert_eq!(ids.len(), 10, "family {family} has {}", ids.len());
        }
    }

    #[test]
    fn test_ids_are_sorted() {
        let registry = PluginRegistry::new();
        let ids = registry.list_effects();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
