//! Typed commands understood by the controller's robot division.
//!
//! Every command knows its operation selector (command number, instance,
//! attribute and service from the vendor table), how to lay out its request
//! payload and how to decode its response payload. Variable access commands
//! come in one type per variable kind, parameterized on index and count: a
//! count of one uses the single-access services, larger counts the plural
//! services with the count in the request payload.
use crate::constants::*;
use crate::error::{ Error, Result };
use crate::frame::{ PayloadReader, RequestBody };
use crate::position::{ CartesianPosition, Position };
use crate::status::Status;

/// A command that encodes into a single request frame and decodes its
/// response payload into a typed value.
pub trait Command {
  type Response;

  /// Returns the operation selector and request payload for this command.
  fn request( &self ) -> Result<RequestBody>;

  /// Decodes the response payload for this command.
  fn decode_response( &self, payload: &[u8] ) -> Result<Self::Response>;
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Read Status

/// Reads the controller status flags.
#[derive( Clone, Copy, Debug, Default, PartialEq, Eq )]
pub struct ReadStatus;

impl Command for ReadStatus {
  type Response = Status;

  fn request( &self ) -> Result<RequestBody> {
    Ok( RequestBody{
      command: COMMAND_READ_STATUS,
      instance: 1,
      attribute: 0,
      service: SERVICE_GET_ALL,
      payload: Vec::new()
    })
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<Status> {
    let mut reader = PayloadReader::new( payload );
    let status = Status::decode( &mut reader )?;
    reader.expect_empty( "status data" )?;
    Ok( status )
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - -  Read Current Position

/// Reads the current position of a control group.
///
/// Control groups 1 through 8 report pulse positions; control groups 101
/// and up report the same robots in cartesian coordinates.
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub struct ReadCurrentPosition {
  pub control_group: u8
}

impl Command for ReadCurrentPosition {
  type Response = Position;

  fn request( &self ) -> Result<RequestBody> {
    Ok( RequestBody{
      command: COMMAND_READ_CURRENT_POSITION,
      instance: self.control_group as u16,
      attribute: 0,
      service: SERVICE_GET_ALL,
      payload: Vec::new()
    })
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<Position> {
    let mut reader = PayloadReader::new( payload );
    let position = Position::decode( &mut reader )?;
    reader.expect_empty( "position data" )?;
    Ok( position )
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Move

/// The speed of a motion command.
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub enum Speed {
  /// Percentage of the maximum joint speed, in units of 0.01%.
  Joint( u32 ),
  /// Translation speed in units of 0.1 mm/s.
  Translation( u32 ),
  /// Rotation speed in units of 0.1 degrees/s.
  Rotation( u32 )
}

impl Speed {
  fn class_word( self ) -> u32 {
    match self {
      Speed::Joint( _ ) => 0,
      Speed::Translation( _ ) => 1,
      Speed::Rotation( _ ) => 2
    }
  }

  fn value_word( self ) -> u32 {
    match self {
      Speed::Joint( value ) => value,
      Speed::Translation( value ) => value,
      Speed::Rotation( value ) => value
    }
  }
}

/// Moves the manipulator to a cartesian target with linear interpolation.
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub struct MoveL {
  pub control_group: u8,
  pub target: CartesianPosition,
  pub speed: Speed
}

impl Command for MoveL {
  type Response = ();

  fn request( &self ) -> Result<RequestBody> {
    let target = &self.target;
    let mut payload = Vec::with_capacity( 104 );

    payload.extend_from_slice( &( self.control_group as u32 ).to_le_bytes() );
    payload.extend_from_slice( &0u32.to_le_bytes() ); // station number
    payload.extend_from_slice( &self.speed.class_word().to_le_bytes() );
    payload.extend_from_slice( &self.speed.value_word().to_le_bytes() );
    payload.extend_from_slice( &target.frame.type_word().to_le_bytes() );
    payload.extend_from_slice( &target.x.to_le_bytes() );
    payload.extend_from_slice( &target.y.to_le_bytes() );
    payload.extend_from_slice( &target.z.to_le_bytes() );
    payload.extend_from_slice( &target.rx.to_le_bytes() );
    payload.extend_from_slice( &target.ry.to_le_bytes() );
    payload.extend_from_slice( &target.rz.to_le_bytes() );
    payload.extend_from_slice( &[0; 8] ); // two reserved words
    payload.extend_from_slice( &( target.configuration.bits() as u32 ).to_le_bytes() );
    payload.extend_from_slice( &0u32.to_le_bytes() ); // extended configuration
    payload.extend_from_slice( &( target.tool as u32 ).to_le_bytes() );
    payload.extend_from_slice( &target.frame.user_frame_word().to_le_bytes() );
    payload.extend_from_slice( &[0; 12] ); // base axes 1 through 3
    payload.extend_from_slice( &[0; 24] ); // station axes 1 through 6

    Ok( RequestBody{
      command: COMMAND_MOVE,
      instance: 2, // linear interpolation
      attribute: 1,
      service: SERVICE_SET_ALL,
      payload
    })
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<()> {
    PayloadReader::new( payload ).expect_empty( "move response" )
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Variable Commands

// Builds the selector for a variable read of `count` values at `index`.
fn read_var_body( command: u16, index: u8, count: u8 ) -> Result<RequestBody> {
  match count {
    0 => Err( Error::InvalidArgument( "cannot read zero variables".to_string() ) ),

    1 => Ok( RequestBody{
      command,
      instance: index as u16,
      attribute: 1,
      service: SERVICE_GET_SINGLE,
      payload: Vec::new()
    }),

    count => {
      let mut payload = Vec::with_capacity( 4 );
      payload.extend_from_slice( &( count as u32 ).to_le_bytes() );
      Ok( RequestBody{
        command,
        instance: index as u16,
        attribute: 0,
        service: SERVICE_READ_PLURAL,
        payload
      })
    }
  }
}

// Builds the selector for a variable write of `count` values at `index`.
// `encode_values` appends the value cells to the payload.
fn write_var_body( command: u16, index: u8, count: usize, encode_values: impl FnOnce( &mut Vec<u8> ) ) -> Result<RequestBody> {
  match count {
    0 => Err( Error::InvalidArgument( "cannot write zero variables".to_string() ) ),

    1 => {
      let mut payload = Vec::new();
      encode_values( &mut payload );
      Ok( RequestBody{
        command,
        instance: index as u16,
        attribute: 1,
        service: SERVICE_SET_SINGLE,
        payload
      })
    },

    count => {
      if count > u8::MAX as usize {
        return Err( Error::InvalidArgument(
          format!( "cannot write {} variables in one command, expected at most {}", count, u8::MAX )
        ));
      }

      let mut payload = Vec::new();
      payload.extend_from_slice( &( count as u32 ).to_le_bytes() );
      encode_values( &mut payload );
      Ok( RequestBody{
        command,
        instance: index as u16,
        attribute: 0,
        service: SERVICE_WRITE_PLURAL,
        payload
      })
    }
  }
}

/// Reads `count` unsigned byte variables starting at `index`.
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub struct ReadUint8Vars {
  pub index: u8,
  pub count: u8
}

impl Command for ReadUint8Vars {
  type Response = Vec<u8>;

  fn request( &self ) -> Result<RequestBody> {
    read_var_body( COMMAND_UINT8_VARIABLE, self.index, self.count )
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<Vec<u8>> {
    let mut reader = PayloadReader::new( payload );
    let mut values = Vec::with_capacity( self.count as usize );
    for _ in 0..self.count {
      values.push( reader.read_u8()? );
      reader.skip( 3 )?;
    }
    reader.expect_empty( "variable data" )?;
    Ok( values )
  }
}

/// Reads `count` 16-bit integer variables starting at `index`.
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub struct ReadInt16Vars {
  pub index: u8,
  pub count: u8
}

impl Command for ReadInt16Vars {
  type Response = Vec<i16>;

  fn request( &self ) -> Result<RequestBody> {
    read_var_body( COMMAND_INT16_VARIABLE, self.index, self.count )
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<Vec<i16>> {
    let mut reader = PayloadReader::new( payload );
    let mut values = Vec::with_capacity( self.count as usize );
    for _ in 0..self.count {
      values.push( reader.read_i16()? );
      reader.skip( 2 )?;
    }
    reader.expect_empty( "variable data" )?;
    Ok( values )
  }
}

/// Reads `count` 32-bit integer variables starting at `index`.
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub struct ReadInt32Vars {
  pub index: u8,
  pub count: u8
}

impl Command for ReadInt32Vars {
  type Response = Vec<i32>;

  fn request( &self ) -> Result<RequestBody> {
    read_var_body( COMMAND_INT32_VARIABLE, self.index, self.count )
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<Vec<i32>> {
    let mut reader = PayloadReader::new( payload );
    let mut values = Vec::with_capacity( self.count as usize );
    for _ in 0..self.count {
      values.push( reader.read_i32()? );
    }
    reader.expect_empty( "variable data" )?;
    Ok( values )
  }
}

/// Reads `count` 32-bit float variables starting at `index`.
#[derive( Clone, Copy, Debug, PartialEq )]
pub struct ReadFloat32Vars {
  pub index: u8,
  pub count: u8
}

impl Command for ReadFloat32Vars {
  type Response = Vec<f32>;

  fn request( &self ) -> Result<RequestBody> {
    read_var_body( COMMAND_FLOAT32_VARIABLE, self.index, self.count )
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<Vec<f32>> {
    let mut reader = PayloadReader::new( payload );
    let mut values = Vec::with_capacity( self.count as usize );
    for _ in 0..self.count {
      values.push( reader.read_f32()? );
    }
    reader.expect_empty( "variable data" )?;
    Ok( values )
  }
}

/// Reads `count` position variables starting at `index`.
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub struct ReadPositionVars {
  pub index: u8,
  pub count: u8
}

impl Command for ReadPositionVars {
  type Response = Vec<Position>;

  fn request( &self ) -> Result<RequestBody> {
    read_var_body( COMMAND_POSITION_VARIABLE, self.index, self.count )
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<Vec<Position>> {
    let mut reader = PayloadReader::new( payload );
    let mut values = Vec::with_capacity( self.count as usize );
    for _ in 0..self.count {
      values.push( Position::decode( &mut reader )? );
    }
    reader.expect_empty( "position data" )?;
    Ok( values )
  }
}

/// Writes consecutive unsigned byte variables starting at `index`.
#[derive( Clone, Debug, PartialEq, Eq )]
pub struct WriteUint8Vars {
  pub index: u8,
  pub values: Vec<u8>
}

impl Command for WriteUint8Vars {
  type Response = ();

  fn request( &self ) -> Result<RequestBody> {
    write_var_body( COMMAND_UINT8_VARIABLE, self.index, self.values.len(), | payload |{
      for &value in &self.values {
        payload.push( value );
        payload.extend_from_slice( &[0; 3] );
      }
    })
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<()> {
    PayloadReader::new( payload ).expect_empty( "write response" )
  }
}

/// Writes consecutive 16-bit integer variables starting at `index`.
#[derive( Clone, Debug, PartialEq, Eq )]
pub struct WriteInt16Vars {
  pub index: u8,
  pub values: Vec<i16>
}

impl Command for WriteInt16Vars {
  type Response = ();

  fn request( &self ) -> Result<RequestBody> {
    write_var_body( COMMAND_INT16_VARIABLE, self.index, self.values.len(), | payload |{
      for &value in &self.values {
        payload.extend_from_slice( &value.to_le_bytes() );
        payload.extend_from_slice( &[0; 2] );
      }
    })
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<()> {
    PayloadReader::new( payload ).expect_empty( "write response" )
  }
}

/// Writes consecutive 32-bit integer variables starting at `index`.
#[derive( Clone, Debug, PartialEq, Eq )]
pub struct WriteInt32Vars {
  pub index: u8,
  pub values: Vec<i32>
}

impl Command for WriteInt32Vars {
  type Response = ();

  fn request( &self ) -> Result<RequestBody> {
    write_var_body( COMMAND_INT32_VARIABLE, self.index, self.values.len(), | payload |{
      for &value in &self.values {
        payload.extend_from_slice( &value.to_le_bytes() );
      }
    })
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<()> {
    PayloadReader::new( payload ).expect_empty( "write response" )
  }
}

/// Writes consecutive 32-bit float variables starting at `index`.
#[derive( Clone, Debug, PartialEq )]
pub struct WriteFloat32Vars {
  pub index: u8,
  pub values: Vec<f32>
}

impl Command for WriteFloat32Vars {
  type Response = ();

  fn request( &self ) -> Result<RequestBody> {
    write_var_body( COMMAND_FLOAT32_VARIABLE, self.index, self.values.len(), | payload |{
      for &value in &self.values {
        payload.extend_from_slice( &value.to_bits().to_le_bytes() );
      }
    })
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<()> {
    PayloadReader::new( payload ).expect_empty( "write response" )
  }
}

/// Writes consecutive position variables starting at `index`.
#[derive( Clone, Debug, PartialEq )]
pub struct WritePositionVars {
  pub index: u8,
  pub values: Vec<Position>
}

impl Command for WritePositionVars {
  type Response = ();

  fn request( &self ) -> Result<RequestBody> {
    write_var_body( COMMAND_POSITION_VARIABLE, self.index, self.values.len(), | payload |{
      for value in &self.values {
        value.encode( payload );
      }
    })
  }

  fn decode_response( &self, payload: &[u8] ) -> Result<()> {
    PayloadReader::new( payload ).expect_empty( "write response" )
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - Heterogeneous Batches

/// A command in tagged-variant form, usable in heterogeneous batches and as
/// an RPC service precondition.
#[derive( Clone, Debug )]
pub enum AnyCommand {
  ReadStatus( ReadStatus ),
  ReadCurrentPosition( ReadCurrentPosition ),
  MoveL( MoveL ),
  ReadUint8Vars( ReadUint8Vars ),
  ReadInt16Vars( ReadInt16Vars ),
  ReadInt32Vars( ReadInt32Vars ),
  ReadFloat32Vars( ReadFloat32Vars ),
  ReadPositionVars( ReadPositionVars ),
  WriteUint8Vars( WriteUint8Vars ),
  WriteInt16Vars( WriteInt16Vars ),
  WriteInt32Vars( WriteInt32Vars ),
  WriteFloat32Vars( WriteFloat32Vars ),
  WritePositionVars( WritePositionVars )
}

/// The decoded response matching an <AnyCommand> variant.
#[derive( Clone, Debug, PartialEq )]
pub enum AnyResponse {
  Status( Status ),
  Position( Position ),
  Uint8( Vec<u8> ),
  Int16( Vec<i16> ),
  Int32( Vec<i32> ),
  Float32( Vec<f32> ),
  Positions( Vec<Position> ),
  Empty
}

impl AnyCommand {
  pub( crate ) fn request( &self ) -> Result<RequestBody> {
    match self {
      AnyCommand::ReadStatus( command ) => command.request(),
      AnyCommand::ReadCurrentPosition( command ) => command.request(),
      AnyCommand::MoveL( command ) => command.request(),
      AnyCommand::ReadUint8Vars( command ) => command.request(),
      AnyCommand::ReadInt16Vars( command ) => command.request(),
      AnyCommand::ReadInt32Vars( command ) => command.request(),
      AnyCommand::ReadFloat32Vars( command ) => command.request(),
      AnyCommand::ReadPositionVars( command ) => command.request(),
      AnyCommand::WriteUint8Vars( command ) => command.request(),
      AnyCommand::WriteInt16Vars( command ) => command.request(),
      AnyCommand::WriteInt32Vars( command ) => command.request(),
      AnyCommand::WriteFloat32Vars( command ) => command.request(),
      AnyCommand::WritePositionVars( command ) => command.request()
    }
  }

  pub( crate ) fn decode_response( &self, payload: &[u8] ) -> Result<AnyResponse> {
    match self {
      AnyCommand::ReadStatus( command ) =>
        Ok( AnyResponse::Status( command.decode_response( payload )? ) ),
      AnyCommand::ReadCurrentPosition( command ) =>
        Ok( AnyResponse::Position( command.decode_response( payload )? ) ),
      AnyCommand::MoveL( command ) => {
        command.decode_response( payload )?;
        Ok( AnyResponse::Empty )
      },
      AnyCommand::ReadUint8Vars( command ) =>
        Ok( AnyResponse::Uint8( command.decode_response( payload )? ) ),
      AnyCommand::ReadInt16Vars( command ) =>
        Ok( AnyResponse::Int16( command.decode_response( payload )? ) ),
      AnyCommand::ReadInt32Vars( command ) =>
        Ok( AnyResponse::Int32( command.decode_response( payload )? ) ),
      AnyCommand::ReadFloat32Vars( command ) =>
        Ok( AnyResponse::Float32( command.decode_response( payload )? ) ),
      AnyCommand::ReadPositionVars( command ) =>
        Ok( AnyResponse::Positions( command.decode_response( payload )? ) ),
      AnyCommand::WriteUint8Vars( command ) => {
        command.decode_response( payload )?;
        Ok( AnyResponse::Empty )
      },
      AnyCommand::WriteInt16Vars( command ) => {
        command.decode_response( payload )?;
        Ok( AnyResponse::Empty )
      },
      AnyCommand::WriteInt32Vars( command ) => {
        command.decode_response( payload )?;
        Ok( AnyResponse::Empty )
      },
      AnyCommand::WriteFloat32Vars( command ) => {
        command.decode_response( payload )?;
        Ok( AnyResponse::Empty )
      },
      AnyCommand::WritePositionVars( command ) => {
        command.decode_response( payload )?;
        Ok( AnyResponse::Empty )
      }
    }
  }
}

impl From<ReadStatus> for AnyCommand {
  fn from( command: ReadStatus ) -> AnyCommand {
    AnyCommand::ReadStatus( command )
  }
}

impl From<ReadCurrentPosition> for AnyCommand {
  fn from( command: ReadCurrentPosition ) -> AnyCommand {
    AnyCommand::ReadCurrentPosition( command )
  }
}

impl From<MoveL> for AnyCommand {
  fn from( command: MoveL ) -> AnyCommand {
    AnyCommand::MoveL( command )
  }
}

impl From<ReadUint8Vars> for AnyCommand {
  fn from( command: ReadUint8Vars ) -> AnyCommand {
    AnyCommand::ReadUint8Vars( command )
  }
}

impl From<ReadInt16Vars> for AnyCommand {
  fn from( command: ReadInt16Vars ) -> AnyCommand {
    AnyCommand::ReadInt16Vars( command )
  }
}

impl From<ReadInt32Vars> for AnyCommand {
  fn from( command: ReadInt32Vars ) -> AnyCommand {
    AnyCommand::ReadInt32Vars( command )
  }
}

impl From<ReadFloat32Vars> for AnyCommand {
  fn from( command: ReadFloat32Vars ) -> AnyCommand {
    AnyCommand::ReadFloat32Vars( command )
  }
}

impl From<ReadPositionVars> for AnyCommand {
  fn from( command: ReadPositionVars ) -> AnyCommand {
    AnyCommand::ReadPositionVars( command )
  }
}

impl From<WriteUint8Vars> for AnyCommand {
  fn from( command: WriteUint8Vars ) -> AnyCommand {
    AnyCommand::WriteUint8Vars( command )
  }
}

impl From<WriteInt16Vars> for AnyCommand {
  fn from( command: WriteInt16Vars ) -> AnyCommand {
    AnyCommand::WriteInt16Vars( command )
  }
}

impl From<WriteInt32Vars> for AnyCommand {
  fn from( command: WriteInt32Vars ) -> AnyCommand {
    AnyCommand::WriteInt32Vars( command )
  }
}

impl From<WriteFloat32Vars> for AnyCommand {
  fn from( command: WriteFloat32Vars ) -> AnyCommand {
    AnyCommand::WriteFloat32Vars( command )
  }
}

impl From<WritePositionVars> for AnyCommand {
  fn from( command: WritePositionVars ) -> AnyCommand {
    AnyCommand::WritePositionVars( command )
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Tests

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  #[test]
  fn a_single_variable_read_uses_the_single_access_service() {
    let body = ReadUint8Vars{ index: 3, count: 1 }.request().unwrap();
    assert_eq!( body.command, 0x007F );
    assert_eq!( body.instance, 3 );
    assert_eq!( body.attribute, 1 );
    assert_eq!( body.service, SERVICE_GET_SINGLE );
    assert!( body.payload.is_empty() );
  }

  #[test]
  fn a_plural_variable_read_carries_the_count_in_the_payload() {
    let body = ReadUint8Vars{ index: 50, count: 4 }.request().unwrap();
    assert_eq!( body.instance, 50 );
    assert_eq!( body.attribute, 0 );
    assert_eq!( body.service, SERVICE_READ_PLURAL );
    assert_eq!( body.payload, 4u32.to_le_bytes() );
  }

  #[test]
  fn a_zero_count_read_is_an_invalid_argument() {
    let error = ReadInt32Vars{ index: 0, count: 0 }.request().unwrap_err();
    assert_eq!( error.kind(), ErrorKind::InvalidArgument );
  }

  #[test]
  fn variable_values_travel_in_four_byte_cells() {
    let body = WriteInt16Vars{ index: 8, values: vec![ -2, 300 ] }.request().unwrap();
    assert_eq!( body.service, SERVICE_WRITE_PLURAL );
    assert_eq!( body.payload[0..4], 2u32.to_le_bytes() );
    assert_eq!( body.payload[4..8], [0xFE, 0xFF, 0x00, 0x00] );
    assert_eq!( body.payload[8..12], [0x2C, 0x01, 0x00, 0x00] );
  }

  #[test]
  fn a_value_response_cell_decodes_to_the_variable_value() {
    let read = ReadUint8Vars{ index: 3, count: 1 };
    assert_eq!( read.decode_response( &[42, 0, 0, 0] ).unwrap(), vec![42] );
  }

  #[test]
  fn a_short_value_response_is_malformed() {
    let read = ReadUint8Vars{ index: 3, count: 2 };
    let error = read.decode_response( &[42, 0, 0, 0] ).unwrap_err();
    assert_eq!( error.kind(), ErrorKind::MalformedResponse );
  }

  #[test]
  fn a_trailing_byte_in_a_value_response_is_malformed() {
    let read = ReadInt32Vars{ index: 0, count: 1 };
    let error = read.decode_response( &[1, 0, 0, 0, 9] ).unwrap_err();
    assert_eq!( error.kind(), ErrorKind::MalformedResponse );
  }

  #[test]
  fn the_move_payload_is_twenty_six_words() {
    use crate::position::{ CartesianPosition, CoordinateSystem, PoseConfiguration };

    let body = MoveL{
      control_group: 1,
      speed: Speed::Translation( 500 ),
      target: CartesianPosition{
        x: 100_000, y: 0, z: -50_000, rx: 0, ry: 0, rz: 1_800_000,
        frame: CoordinateSystem::Robot,
        configuration: PoseConfiguration::default(),
        tool: 0
      }
    }.request().unwrap();

    assert_eq!( body.command, COMMAND_MOVE );
    assert_eq!( body.payload.len(), 104 );
    assert_eq!( body.payload[8..12], 1u32.to_le_bytes() );   // speed class: translation
    assert_eq!( body.payload[12..16], 500u32.to_le_bytes() );
    assert_eq!( body.payload[16..20], 17u32.to_le_bytes() ); // robot frame
    assert_eq!( body.payload[20..24], 100_000i32.to_le_bytes() );
  }
}
