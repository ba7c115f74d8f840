// DC Motor click: DRV8833-style H-bridge, two PWM inputs plus nSLEEP
//
//   IN1   IN2   output
//   PWM   0     forward, fast decay
//   0     PWM   reverse, fast decay
//   1     1     brake (both low-side on)
//   0     0     coast (outputs Hi-Z)

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::Error;

// tWAKE, nSLEEP high to outputs enabled
const WAKE_US: u32 = 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Driving(Direction, u8),
    Braking,
    Coasting,
    Asleep,
}

pub struct DcMotor<IN1, IN2, SLP> {
    in1: IN1,
    in2: IN2,
    sleep: SLP,
    state: State,
}

impl<IN1, IN2, SLP, E> DcMotor<IN1, IN2, SLP>
where
    IN1: SetDutyCycle<Error = E>,
    IN2: SetDutyCycle<Error = E>,
    SLP: OutputPin,
{
    /// Starts coasting with the bridge awake.
    pub fn new(in1: IN1, in2: IN2, sleep: SLP, delay: &mut impl DelayNs) -> Result<Self, Error<E>> {
        let mut motor = Self {
            in1,
            in2,
            sleep,
            state: State::Asleep,
        };
        motor.coast()?;
        motor.wake(delay)?;
        Ok(motor)
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn drive(&mut self, in1_percent: u8, in2_percent: u8) -> Result<(), Error<E>> {
        self.in1
            .set_duty_cycle_percent(in1_percent)
            .map_err(Error::Bus)?;
        self.in2
            .set_duty_cycle_percent(in2_percent)
            .map_err(Error::Bus)
    }

    pub fn forward(&mut self, percent: u8) -> Result<(), Error<E>> {
        self.run(Direction::Forward, percent)
    }

    pub fn reverse(&mut self, percent: u8) -> Result<(), Error<E>> {
        self.run(Direction::Reverse, percent)
    }

    pub fn run(&mut self, direction: Direction, percent: u8) -> Result<(), Error<E>> {
        if percent > 100 {
            return Err(Error::InvalidArgument);
        }
        if self.state == State::Asleep {
            return Err(Error::NotInitialized);
        }
        match direction {
            Direction::Forward => self.drive(percent, 0)?,
            Direction::Reverse => self.drive(0, percent)?,
        }
        self.state = State::Driving(direction, percent);
        Ok(())
    }

    /// Signed speed, -100..=100; values outside are clamped. 0 coasts.
    pub fn set_speed(&mut self, speed: i8) -> Result<(), Error<E>> {
        let clamped = speed.clamp(-100, 100);
        if clamped != speed {
            warn!("DC motor: speed {} clamped to {}", speed, clamped);
        }
        match clamped {
            0 => self.coast(),
            s if s > 0 => self.run(Direction::Forward, s as u8),
            s => self.run(Direction::Reverse, s.unsigned_abs()),
        }
    }

    pub fn brake(&mut self) -> Result<(), Error<E>> {
        if self.state == State::Asleep {
            return Err(Error::NotInitialized);
        }
        self.drive(100, 100)?;
        self.state = State::Braking;
        Ok(())
    }

    pub fn coast(&mut self) -> Result<(), Error<E>> {
        self.drive(0, 0)?;
        if self.state != State::Asleep {
            self.state = State::Coasting;
        }
        Ok(())
    }

    /// Low-power mode; the outputs float.
    pub fn sleep(&mut self) -> Result<(), Error<E>> {
        self.drive(0, 0)?;
        self.sleep.set_low().map_err(Error::pin)?;
        self.state = State::Asleep;
        Ok(())
    }

    /// Wakes into coast; both inputs are driven low first.
    pub fn wake(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.drive(0, 0)?;
        self.sleep.set_high().map_err(Error::pin)?;
        delay.delay_us(WAKE_US);
        self.state = State::Coasting;
        Ok(())
    }

    pub fn release(self) -> (IN1, IN2, SLP) {
        (self.in1, self.in2, self.sleep)
    }
}
